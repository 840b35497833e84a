use tracing::{debug, instrument};

use crate::common::RawImage;
use crate::config::Settings;
use crate::error::PredictionError;
use crate::model::TrainedModel;
use crate::pipeline::context::{ModalityContext, ScoredState};
use crate::pipeline::services::{FeatureExtractor, ImageDecoder, RegionExtractor};

/// Decode, crop, extract and score one uploaded image. Every stage is pure
/// apart from allocation, so one instance serves all requests.
#[derive(Debug, Clone)]
pub struct ModalityPipeline {
    decoder: ImageDecoder,
    region_extractor: RegionExtractor,
    feature_extractor: FeatureExtractor,
}

impl ModalityPipeline {
    pub fn new(decoder: ImageDecoder, region_extractor: RegionExtractor) -> Self {
        Self {
            decoder,
            region_extractor,
            feature_extractor: FeatureExtractor::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ImageDecoder::new(&settings.pipeline),
            RegionExtractor::new(settings.region.clone()),
        )
    }

    #[instrument(skip_all, fields(modality = %raw.modality(), bytes = raw.len()))]
    pub fn run(
        &self,
        raw: RawImage,
        model: &TrainedModel,
    ) -> Result<ModalityContext<ScoredState>, PredictionError> {
        let ctx = ModalityContext::new(raw);
        let modality = ctx.modality();

        let grid = self.decoder.decode(ctx.raw())?;
        let ctx = ctx.into_decoded(grid);

        let crop = self.region_extractor.extract(modality, ctx.grid())?;
        let ctx = ctx.into_cropped(crop);

        let features = self.feature_extractor.extract(ctx.crop())?;
        let ctx = ctx.into_extracted(features);

        let score = model.scorer().score(ctx.features())?;
        let ctx = ctx.into_scored(score);

        debug!(
            "Scored {} at {:.3} in {:?} ({:?})",
            modality,
            score.probability(),
            ctx.metrics().total(),
            ctx.metrics()
        );
        Ok(ctx)
    }
}

impl Default for ModalityPipeline {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Modality;
    use crate::model::synthetic::{SyntheticTissue, conjunctiva_crop, eye_photo};
    use crate::model::test_support::trained_model;
    use image::ImageFormat;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    fn png(image: &image::RgbImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn every_stage_is_timed() {
        let mut rng = StdRng::seed_from_u64(5);
        let photo = eye_photo(&mut rng, 160, 120, &SyntheticTissue::new(0.9, 4.0));
        let raw = RawImage::new(Modality::Eye, png(&photo));

        let ctx = ModalityPipeline::default()
            .run(raw, &trained_model())
            .unwrap();
        assert_eq!(ctx.state_name(), "Scored");
        assert_eq!(ctx.features().len(), Modality::Eye.feature_len());
        let metrics = ctx.metrics();
        assert!(metrics.decode().is_some());
        assert!(metrics.region().is_some());
        assert!(metrics.features().is_some());
        assert!(metrics.scoring().is_some());
    }

    #[test]
    fn scoring_is_repeatable() {
        let mut rng = StdRng::seed_from_u64(8);
        let crop = conjunctiva_crop(&mut rng, 80, 60, &SyntheticTissue::new(0.4, 6.0));
        let bytes = png(&crop);
        let model = trained_model();
        let pipeline = ModalityPipeline::default();

        let first = pipeline
            .run(RawImage::new(Modality::Palpebral, bytes.clone()), &model)
            .unwrap();
        let second = pipeline
            .run(RawImage::new(Modality::Palpebral, bytes), &model)
            .unwrap();
        assert_eq!(
            first.score().probability().to_bits(),
            second.score().probability().to_bits()
        );
        assert_eq!(first.features(), second.features());
    }

    #[test]
    fn corrupt_bytes_fail_with_the_modality_attached() {
        let err = ModalityPipeline::default()
            .run(
                RawImage::new(Modality::Forniceal, b"definitely not a png".to_vec()),
                &trained_model(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PredictionError::Decode {
                modality: Modality::Forniceal,
                ..
            }
        ));
    }
}
