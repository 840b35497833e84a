use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use super::artifact;
use super::trained_model::TrainedModel;
use super::trainer::ModelTrainer;
use crate::config::Settings;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Loading,
    Training,
    Ready,
}

type InitTask = JoinHandle<Result<Arc<TrainedModel>, ModelError>>;

/// Owns the process-wide model. The first caller loads the artifact (or
/// trains and persists a new one); concurrent callers wait for that result.
///
/// Initialization runs on its own task. A caller that is dropped mid-way
/// leaves the task running, and the next caller picks up the same task. A
/// failed initialization leaves the cell empty, so the next request tries
/// again.
#[derive(Debug)]
pub struct ModelLifecycleManager {
    initializer: Initializer,
    model: OnceCell<Arc<TrainedModel>>,
    pending: Mutex<Option<InitTask>>,
}

impl ModelLifecycleManager {
    pub fn new(artifact_path: Option<PathBuf>, trainer: ModelTrainer) -> Self {
        Self {
            initializer: Initializer::new(artifact_path, trainer, LifecycleState::Uninitialized),
            model: OnceCell::new(),
            pending: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.model.artifact_path.clone(),
            ModelTrainer::from_settings(settings),
        )
    }

    /// A manager that already holds `model` and never touches disk.
    pub fn ready(model: TrainedModel, trainer: ModelTrainer) -> Self {
        Self {
            initializer: Initializer::new(None, trainer, LifecycleState::Ready),
            model: OnceCell::new_with(Some(Arc::new(model))),
            pending: Mutex::new(None),
        }
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.initializer.artifact_path.as_deref()
    }

    pub fn state(&self) -> LifecycleState {
        self.initializer.state()
    }

    /// How many times initialization has started.
    pub fn initialization_count(&self) -> usize {
        self.initializer.initializations.load(Ordering::SeqCst)
    }

    pub async fn get_or_create(&self) -> Result<Arc<TrainedModel>, ModelError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let mut pending = self.pending.lock().await;
                let task = pending.get_or_insert_with(|| {
                    let initializer = self.initializer.clone();
                    tokio::spawn(initializer.run())
                });
                let joined = task.await;
                *pending = None;
                joined.map_err(|e| ModelError::Task(e.to_string()))?
            })
            .await?;
        Ok(Arc::clone(model))
    }
}

/// Everything the initialization task needs, shared with the manager.
#[derive(Debug, Clone)]
struct Initializer {
    artifact_path: Option<PathBuf>,
    trainer: ModelTrainer,
    state: Arc<RwLock<LifecycleState>>,
    initializations: Arc<AtomicUsize>,
}

impl Initializer {
    fn new(artifact_path: Option<PathBuf>, trainer: ModelTrainer, state: LifecycleState) -> Self {
        Self {
            artifact_path,
            trainer,
            state: Arc::new(RwLock::new(state)),
            initializations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    async fn run(self) -> Result<Arc<TrainedModel>, ModelError> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        let span = info_span!("model_init", artifact = ?self.artifact_path);
        let result = self.initialize().instrument(span).await;
        self.set_state(match result {
            Ok(_) => LifecycleState::Ready,
            Err(_) => LifecycleState::Uninitialized,
        });
        result
    }

    async fn initialize(&self) -> Result<Arc<TrainedModel>, ModelError> {
        if let Some(path) = self.artifact_path.clone() {
            self.set_state(LifecycleState::Loading);
            let loaded = tokio::task::spawn_blocking(move || artifact::load(&path))
                .await
                .map_err(|e| ModelError::Task(e.to_string()))?;
            match loaded {
                Ok(model) => {
                    info!("Loaded model trained at {}", model.metadata().trained_at);
                    return Ok(Arc::new(model));
                }
                Err(ModelError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    info!("No model artifact found, training a new model");
                }
                Err(e) => warn!("Discarding unusable model artifact: {}", e),
            }
        }

        self.set_state(LifecycleState::Training);
        let trainer = self.trainer.clone();
        let model = tokio::task::spawn_blocking(move || trainer.train())
            .await
            .map_err(|e| ModelError::Task(e.to_string()))??;
        let model = Arc::new(model);

        if let Some(path) = self.artifact_path.clone() {
            let to_save = Arc::clone(&model);
            let saved = tokio::task::spawn_blocking(move || artifact::save(&to_save, &path))
                .await
                .map_err(|e| ModelError::Task(e.to_string()))
                .and_then(|result| result);
            match saved {
                Ok(()) => info!("Persisted newly trained model"),
                Err(e) => warn!("Failed to persist trained model, keeping it in memory: {}", e),
            }
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RegionConfig, TrainingConfig};
    use crate::model::test_support::{
        quick_trainer, quick_training_config, temp_artifact_path, trained_model,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_initialization() {
        let manager = Arc::new(ModelLifecycleManager::new(None, quick_trainer()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_or_create().await.unwrap() })
            })
            .collect();

        let models: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(manager.initialization_count(), 1);
        assert_eq!(manager.state(), LifecycleState::Ready);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
    }

    #[tokio::test]
    async fn loads_existing_artifact_without_training() {
        let saved = trained_model();
        let path = temp_artifact_path();
        artifact::save(&saved, &path).unwrap();

        let trainer = ModelTrainer::new(
            TrainingConfig {
                seed: 99,
                ..quick_training_config()
            },
            RegionConfig::default(),
            0.15,
        );
        let manager = ModelLifecycleManager::new(Some(path.clone()), trainer);
        let model = manager.get_or_create().await.unwrap();
        assert_eq!(*model, saved);
        assert_eq!(manager.state(), LifecycleState::Ready);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn corrupt_artifact_is_retrained_and_replaced() {
        let path = temp_artifact_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not a model").unwrap();

        let manager = ModelLifecycleManager::new(Some(path.clone()), quick_trainer());
        let model = manager.get_or_create().await.unwrap();
        assert_eq!(artifact::load(&path).unwrap(), *model);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn failed_training_can_be_retried() {
        let trainer = ModelTrainer::new(
            TrainingConfig {
                epochs: 0,
                ..quick_training_config()
            },
            RegionConfig::default(),
            0.15,
        );
        let manager = ModelLifecycleManager::new(None, trainer);
        assert!(manager.get_or_create().await.is_err());
        assert_eq!(manager.state(), LifecycleState::Uninitialized);
        assert!(manager.get_or_create().await.is_err());
        assert_eq!(manager.initialization_count(), 2);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_restart_initialization() {
        let manager = ModelLifecycleManager::new(None, quick_trainer());
        let first = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            manager.get_or_create(),
        )
        .await;
        assert!(first.is_err());

        manager.get_or_create().await.unwrap();
        assert_eq!(manager.initialization_count(), 1);
        assert_eq!(manager.state(), LifecycleState::Ready);
    }

    #[tokio::test]
    async fn ready_manager_skips_initialization() {
        let manager = ModelLifecycleManager::ready(trained_model(), quick_trainer());
        manager.get_or_create().await.unwrap();
        assert_eq!(manager.initialization_count(), 0);
        assert_eq!(manager.state(), LifecycleState::Ready);
    }
}
