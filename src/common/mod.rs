pub mod modality;
pub mod patient;

pub use modality::{Modality, ModalityImages, RawImage};
pub use patient::{Gender, PatientContext};
