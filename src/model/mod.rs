pub mod artifact;
pub mod lifecycle;
pub mod synthetic;
pub mod trained_model;
pub mod trainer;

#[cfg(test)]
pub(crate) mod test_support;

pub use lifecycle::{LifecycleState, ModelLifecycleManager};
pub use trained_model::{ModelMetadata, TrainedModel};
pub use trainer::ModelTrainer;
