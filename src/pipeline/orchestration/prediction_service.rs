use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::modality_pipeline::ModalityPipeline;
use super::report::{ModalityFailure, ModalityTiming, PredictionReport};
use crate::common::{Modality, ModalityImages, PatientContext};
use crate::error::PredictionError;
use crate::model::ModelLifecycleManager;

#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    pub images: ModalityImages,
    pub context: PatientContext,
}

impl PredictionRequest {
    pub fn new(images: ModalityImages, context: PatientContext) -> Self {
        Self { images, context }
    }
}

/// Runs every supplied modality on the blocking pool and fuses whatever
/// succeeded. Failures confined to one image are reported, not propagated.
#[derive(Debug, Clone)]
pub struct PredictionService {
    manager: Arc<ModelLifecycleManager>,
    pipeline: Arc<ModalityPipeline>,
    require_eye: bool,
}

impl PredictionService {
    pub fn new(
        manager: Arc<ModelLifecycleManager>,
        pipeline: ModalityPipeline,
        require_eye: bool,
    ) -> Self {
        Self {
            manager,
            pipeline: Arc::new(pipeline),
            require_eye,
        }
    }

    async fn process(self, request: PredictionRequest) -> Result<PredictionReport, PredictionError> {
        let PredictionRequest { images, context } = request;
        if images.is_empty() {
            return Err(PredictionError::InsufficientEvidence(
                "no images were supplied".to_string(),
            ));
        }
        if self.require_eye && !images.contains(Modality::Eye) {
            return Err(PredictionError::InsufficientEvidence(
                "an eye image is required".to_string(),
            ));
        }

        let model = self.manager.get_or_create().await?;

        let tasks = images.into_raw_images().into_iter().map(|raw| {
            let modality = raw.modality();
            let pipeline = Arc::clone(&self.pipeline);
            let model = Arc::clone(&model);
            let handle = tokio::task::spawn_blocking(move || pipeline.run(raw, &model));
            async move { (modality, handle.await) }
        });

        let mut scores = Vec::new();
        let mut failures = Vec::new();
        let mut timings = Vec::new();
        for (modality, joined) in futures::future::join_all(tasks).await {
            match joined {
                Ok(Ok(ctx)) => {
                    scores.push(ctx.score());
                    timings.push(ModalityTiming {
                        modality,
                        metrics: *ctx.metrics(),
                    });
                }
                Ok(Err(error)) if error.is_per_modality() => {
                    warn!("Excluding {} from fusion: {}", modality, error);
                    failures.push(ModalityFailure { modality, error });
                }
                Ok(Err(error)) => return Err(error),
                Err(e) => {
                    return Err(PredictionError::Worker(format!(
                        "{modality} pipeline task failed: {e}"
                    )));
                }
            }
        }

        if scores.is_empty() {
            warn!("All {} supplied modalities failed", failures.len());
            return Err(PredictionError::NoUsableModality(failures));
        }

        let fused = model.fusion().fuse(&scores, &context)?;
        info!(
            "Predicted {:?} with {:.1}% confidence from {} of {} modalities",
            fused.result.label(),
            fused.result.confidence(),
            scores.len(),
            scores.len() + failures.len()
        );

        Ok(PredictionReport {
            request_id: Uuid::nil(),
            result: fused.result,
            scores,
            failures,
            image_probability: fused.image_probability,
            demographic_shift: fused.demographic_shift,
            timings,
        })
    }
}

impl Service<PredictionRequest> for PredictionService {
    type Response = PredictionReport;
    type Error = PredictionError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PredictionRequest) -> Self::Future {
        let request_id = Uuid::new_v4();
        let span = info_span!("prediction", %request_id, modalities = request.images.count());
        let service = self.clone();
        Box::pin(
            async move {
                debug!("Prediction request received");
                let mut report = service.process(request).await?;
                report.request_id = request_id;
                Ok(report)
            }
            .instrument(span),
        )
    }
}
