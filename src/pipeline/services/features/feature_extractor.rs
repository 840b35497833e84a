use tracing::debug;

use crate::common::Modality;
use crate::error::PredictionError;
use crate::pipeline::services::image::color_space::{rgb_to_hsv, rgb_to_lab, rgb_to_luma};
use crate::pipeline::types::{FeatureVector, RegionCrop};

/// Color and pallor statistics shared by every modality.
pub const COLOR_FEATURE_LEN: usize = 11;
/// Luma texture statistics appended for the eye and combined modalities.
pub const TEXTURE_FEATURE_LEN: usize = 2;
pub const EXTENDED_FEATURE_LEN: usize = COLOR_FEATURE_LEN + TEXTURE_FEATURE_LEN;

/// Floor for every denominator computed from crop content.
const EPSILON: f32 = 1e-6;
/// a* below this reads as pale tissue.
const PALE_A_STAR: f32 = 25.0;

/// Running mean and variance (Welford).
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    n: f32,
    mean: f32,
    m2: f32,
}

impl RunningStats {
    fn push(&mut self, value: f32) {
        self.n += 1.0;
        let delta = value - self.mean;
        self.mean += delta / self.n;
        self.m2 += delta * (value - self.mean);
    }

    fn mean(&self) -> f32 {
        self.mean
    }

    fn std(&self) -> f32 {
        if self.n < 2.0 {
            0.0
        } else {
            (self.m2 / (self.n - 1.0)).max(0.0).sqrt()
        }
    }
}

/// Stateless mapping from a normalized crop to its feature vector.
///
/// Layout of the color block:
/// 0-2 mean R, G, B; 3-4 std R, G; 5-6 mean and std HSV saturation;
/// 7 mean a*; 8 chromatic redness; 9 erythema index; 10 pale pixel share.
/// The texture block adds mean luma gradient and luma std.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, crop: &RegionCrop) -> Result<FeatureVector, PredictionError> {
        let modality = crop.modality();
        let mut values = self.color_features(crop);
        if modality.feature_len() == EXTENDED_FEATURE_LEN {
            values.extend(self.texture_features(crop));
        }
        debug!("Extracted {} features for {}", values.len(), modality);
        FeatureVector::new(modality, values)
    }

    fn color_features(&self, crop: &RegionCrop) -> Vec<f32> {
        let mut red = RunningStats::default();
        let mut green = RunningStats::default();
        let mut blue = RunningStats::default();
        let mut saturation = RunningStats::default();
        let mut a_star = RunningStats::default();
        let mut redness = RunningStats::default();
        let mut erythema = RunningStats::default();
        let mut pale = 0usize;
        let mut total = 0usize;

        for px in crop.pixels().pixels() {
            let [r, g, b] = px.0;
            let (rf, gf, bf) = (r as f32, g as f32, b as f32);

            red.push(rf / 255.0);
            green.push(gf / 255.0);
            blue.push(bf / 255.0);

            let (_, s, _) = rgb_to_hsv(r, g, b);
            saturation.push(s);

            let (_, a, _) = rgb_to_lab(r, g, b);
            a_star.push(a / 100.0);
            if a < PALE_A_STAR {
                pale += 1;
            }

            redness.push(rf / (rf + gf + bf).max(EPSILON));
            erythema.push(((rf + 1.0) / (gf + 1.0)).ln());
            total += 1;
        }

        vec![
            red.mean(),
            green.mean(),
            blue.mean(),
            red.std(),
            green.std(),
            saturation.mean(),
            saturation.std(),
            a_star.mean(),
            redness.mean(),
            erythema.mean(),
            pale as f32 / (total as f32).max(EPSILON),
        ]
    }

    fn texture_features(&self, crop: &RegionCrop) -> [f32; TEXTURE_FEATURE_LEN] {
        let pixels = crop.pixels();
        let (width, height) = pixels.dimensions();
        let luma = |x: u32, y: u32| {
            let p = pixels.get_pixel(x, y);
            rgb_to_luma(p[0], p[1], p[2]) / 255.0
        };

        let mut gradient = RunningStats::default();
        let mut level = RunningStats::default();
        for y in 0..height {
            for x in 0..width {
                let center = luma(x, y);
                level.push(center);
                let dx = if x + 1 < width { luma(x + 1, y) - center } else { 0.0 };
                let dy = if y + 1 < height { luma(x, y + 1) - center } else { 0.0 };
                gradient.push((dx * dx + dy * dy).sqrt());
            }
        }
        [gradient.mean(), level.std()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::synthetic::{SyntheticTissue, conjunctiva_crop};
    use image::{ImageBuffer, Rgb};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn crop(modality: Modality, pallor: f32, seed: u64) -> RegionCrop {
        let mut rng = StdRng::seed_from_u64(seed);
        let pixels = conjunctiva_crop(&mut rng, 128, 64, &SyntheticTissue::new(pallor, 6.0));
        RegionCrop::new(modality, pixels).unwrap()
    }

    #[test]
    fn lengths_follow_modality() {
        let extractor = FeatureExtractor::new();
        for modality in Modality::ALL {
            let features = extractor.extract(&crop(modality, 0.5, 1)).unwrap();
            assert_eq!(features.len(), modality.feature_len());
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::new();
        let input = crop(Modality::Eye, 0.4, 11);
        let first = extractor.extract(&input).unwrap();
        for _ in 0..5 {
            let again = extractor.extract(&input).unwrap();
            let same = first
                .values()
                .iter()
                .zip(again.values())
                .all(|(a, b)| a.to_bits() == b.to_bits());
            assert!(same);
        }
    }

    #[test]
    fn uniform_crop_stays_finite() {
        for color in [[0, 0, 0], [255, 255, 255], [180, 90, 90]] {
            let pixels = ImageBuffer::from_pixel(16, 16, Rgb(color));
            let crop = RegionCrop::new(Modality::FornicealPalpebral, pixels).unwrap();
            let features = FeatureExtractor::new().extract(&crop).unwrap();
            assert!(features.values().iter().all(|v| v.is_finite()));
            assert_eq!(features.values()[3], 0.0);
            assert_eq!(features.values()[COLOR_FEATURE_LEN], 0.0);
        }
    }

    #[test]
    fn pallor_lowers_redness_features() {
        let extractor = FeatureExtractor::new();
        let red = extractor.extract(&crop(Modality::Palpebral, 0.05, 5)).unwrap();
        let pale = extractor.extract(&crop(Modality::Palpebral, 0.95, 5)).unwrap();
        // a*, erythema index and saturation drop; pale share rises.
        assert!(pale.values()[7] < red.values()[7]);
        assert!(pale.values()[9] < red.values()[9]);
        assert!(pale.values()[5] < red.values()[5]);
        assert!(pale.values()[10] > red.values()[10]);
    }
}
