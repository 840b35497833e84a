use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::util::BoxCloneService;
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tracing::info;

use super::modality_pipeline::ModalityPipeline;
use super::prediction_service::{PredictionRequest, PredictionService};
use super::report::PredictionReport;
use crate::common::{ModalityImages, PatientContext};
use crate::config::Settings;
use crate::error::{ModelError, PredictionError};
use crate::model::{ModelLifecycleManager, TrainedModel};
use crate::pipeline::types::PredictionResult;

type PredictionStack = BoxCloneService<PredictionRequest, PredictionReport, BoxError>;

/// The single entry point for callers: a [`PredictionService`] behind a
/// timeout, sharing one lifecycle manager across clones.
#[derive(Clone)]
pub struct Predictor {
    service: PredictionStack,
    manager: Arc<ModelLifecycleManager>,
    timeout: Duration,
}

impl Predictor {
    pub fn new(settings: &Settings) -> Self {
        Self::with_manager(
            Arc::new(ModelLifecycleManager::from_settings(settings)),
            settings,
        )
    }

    pub fn with_manager(manager: Arc<ModelLifecycleManager>, settings: &Settings) -> Self {
        let timeout = settings.pipeline.timeout();
        let service = PredictionService::new(
            Arc::clone(&manager),
            ModalityPipeline::from_settings(settings),
            settings.pipeline.require_eye,
        );
        let stack = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .service(service);

        Self {
            service: BoxCloneService::new(stack),
            manager,
            timeout,
        }
    }

    pub fn manager(&self) -> &Arc<ModelLifecycleManager> {
        &self.manager
    }

    pub fn predict(
        &self,
        images: ModalityImages,
        context: PatientContext,
    ) -> impl Future<Output = Result<PredictionResult, PredictionError>> + Send + 'static {
        let report = self.predict_detailed(images, context);
        async move { report.await.map(|report| report.result) }
    }

    pub fn predict_detailed(
        &self,
        images: ModalityImages,
        context: PatientContext,
    ) -> impl Future<Output = Result<PredictionReport, PredictionError>> + Send + 'static {
        let service = self.service.clone();
        let timeout = self.timeout;
        async move {
            service
                .oneshot(PredictionRequest::new(images, context))
                .await
                .map_err(|e| classify_error(e, timeout))
        }
    }

    /// Loads or trains the model now instead of on the first request. Not
    /// subject to the request timeout.
    pub fn warm_up(
        &self,
    ) -> impl Future<Output = Result<Arc<TrainedModel>, ModelError>> + Send + 'static {
        let manager = Arc::clone(&self.manager);
        async move {
            let model = manager.get_or_create().await?;
            info!(
                "Model ready (seed {}, trained at {})",
                model.metadata().seed,
                model.metadata().trained_at
            );
            Ok(model)
        }
    }
}

fn classify_error(error: BoxError, timeout: Duration) -> PredictionError {
    if error.is::<Elapsed>() {
        return PredictionError::Timeout(timeout);
    }
    match error.downcast::<PredictionError>() {
        Ok(error) => *error,
        Err(other) => PredictionError::Worker(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Modality;
    use crate::model::test_support::{quick_trainer, trained_model};

    #[test]
    fn elapsed_maps_to_timeout() {
        let timeout = Duration::from_millis(5);
        let err = classify_error(Box::new(Elapsed::new()), timeout);
        assert!(matches!(err, PredictionError::Timeout(d) if d == timeout));

        let err = classify_error(
            Box::new(PredictionError::DuplicateModality(Modality::Eye)),
            timeout,
        );
        assert!(matches!(err, PredictionError::DuplicateModality(Modality::Eye)));
    }

    #[tokio::test]
    async fn warm_up_reuses_the_ready_model() {
        let manager = Arc::new(ModelLifecycleManager::ready(trained_model(), quick_trainer()));
        let predictor = Predictor::with_manager(Arc::clone(&manager), &Settings::default());
        let first = predictor.warm_up().await.unwrap();
        let second = predictor.clone().warm_up().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.initialization_count(), 0);
    }
}
