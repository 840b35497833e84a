pub mod demographic_calibration;
pub mod ensemble_fusion;

pub use demographic_calibration::{AgeBand, CalibrationParams, DemographicCalibration};
pub use ensemble_fusion::{EnsembleFusion, FusedPrediction, FusionParams, ModalityWeights};
