use image::imageops::{self, FilterType};
use tracing::debug;

use super::color_space::{hue_in_window, rgb_to_hsv, rgb_to_luma};
use super::region::ImageRegion;
use crate::common::Modality;
use crate::config::RegionConfig;
use crate::error::PredictionError;
use crate::pipeline::types::{PixelGrid, RegionCrop};

/// Sampled tissue and sclera coverage of one image row.
#[derive(Debug, Clone, Copy)]
struct LineProfile {
    position: u32,
    tissue: f32,
    sclera: f32,
}

/// Locates the conjunctiva in eye photographs and normalizes every crop to
/// the canonical resolution.
#[derive(Debug, Clone)]
pub struct RegionExtractor {
    config: RegionConfig,
}

impl RegionExtractor {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub fn extract(&self, modality: Modality, grid: &PixelGrid) -> Result<RegionCrop, PredictionError> {
        let (width, height) = grid.dimensions();
        let min_side = self.config.min_input_side;
        if width < min_side || height < min_side {
            return Err(PredictionError::InvalidRegion {
                modality,
                reason: format!("{width}x{height} is below the {min_side}px minimum side"),
            });
        }

        // A located band is judged by having been found; only uploaded crops
        // can be blank.
        let region = if modality.is_pre_cropped() {
            let region = ImageRegion::full_image(width, height);
            let luma_std = self.luma_std(grid, region);
            if luma_std < self.config.blank_luma_std {
                return Err(PredictionError::InvalidRegion {
                    modality,
                    reason: format!("content is uniform (luma std {luma_std:.2})"),
                });
            }
            region
        } else {
            self.locate_conjunctiva(grid)?
        };

        debug!(
            "{} region at ({}, {}) {}x{}",
            modality, region.x, region.y, region.width, region.height
        );
        self.normalize(modality, grid, region)
    }

    /// Finds the reddest horizontal tissue band at or below the visible sclera.
    fn locate_conjunctiva(&self, grid: &PixelGrid) -> Result<ImageRegion, PredictionError> {
        let not_found = |reason: String| PredictionError::RegionNotFound {
            modality: Modality::Eye,
            reason,
        };
        let (width, height) = grid.dimensions();
        let step = self.config.sample_step;

        let rows: Vec<LineProfile> = (0..height)
            .step_by(step as usize)
            .map(|y| self.row_profile(grid, y))
            .collect();

        // The lower lid conjunctiva sits below the top of the visible sclera.
        let sclera_top = rows
            .iter()
            .find(|r| r.sclera >= self.config.sclera_row_fraction)
            .map(|r| r.position);
        let search_from = sclera_top.unwrap_or(0);

        let mut best: Option<(usize, usize, f32)> = None;
        let mut run_start: Option<usize> = None;
        let mut run_mass = 0.0f32;
        for (index, row) in rows.iter().enumerate() {
            let in_band = row.position >= search_from && row.tissue >= self.config.tissue_row_fraction;
            if in_band {
                run_start.get_or_insert(index);
                run_mass += row.tissue;
            }
            if !in_band || index + 1 == rows.len() {
                if let Some(start) = run_start.take() {
                    let end = if in_band { index } else { index - 1 };
                    if best.map_or(true, |(_, _, mass)| run_mass > mass) {
                        best = Some((start, end, run_mass));
                    }
                }
                run_mass = 0.0;
            }
        }

        let (start, end, _) = best.ok_or_else(|| {
            not_found(match sclera_top {
                Some(top) => format!("no tissue band below sclera at row {top}"),
                None => "no tissue band and no visible sclera".to_string(),
            })
        })?;

        let y0 = rows[start].position;
        let y1 = (rows[end].position + step).min(height);
        if y1 - y0 < self.config.min_band_rows {
            return Err(not_found(format!(
                "tissue band is only {} rows tall",
                y1 - y0
            )));
        }

        let columns: Vec<u32> = (0..width)
            .step_by(step as usize)
            .filter(|&x| self.column_tissue(grid, x, y0, y1) >= self.config.tissue_row_fraction)
            .collect();
        let (x0, x1) = match (columns.first(), columns.last()) {
            (Some(&first), Some(&last)) => (first, last + step),
            _ => return Err(not_found("tissue band has no dense columns".to_string())),
        };

        let region = ImageRegion::from_bounds(x0, y0, x1, y1, width, height);
        let fraction = region.fraction_of(width, height);
        if region.is_empty() || fraction < self.config.min_area_fraction {
            return Err(not_found(format!(
                "tissue band covers {:.1}% of the image",
                fraction * 100.0
            )));
        }
        Ok(region)
    }

    fn is_tissue(&self, px: &image::Rgb<u8>) -> bool {
        let [r, g, b] = px.0;
        let (hue, saturation, value) = rgb_to_hsv(r, g, b);
        hue_in_window(hue, self.config.tissue_hue_min, self.config.tissue_hue_max)
            && saturation >= self.config.tissue_min_saturation
            && value >= self.config.tissue_min_value
    }

    fn is_sclera(&self, px: &image::Rgb<u8>) -> bool {
        let [r, g, b] = px.0;
        let (_, saturation, _) = rgb_to_hsv(r, g, b);
        rgb_to_luma(r, g, b) >= self.config.sclera_min_luma
            && saturation <= self.config.sclera_max_saturation
    }

    fn row_profile(&self, grid: &PixelGrid, y: u32) -> LineProfile {
        let mut tissue = 0u32;
        let mut sclera = 0u32;
        let mut samples = 0u32;
        for x in (0..grid.width()).step_by(self.config.sample_step as usize) {
            let px = grid.get_pixel(x, y);
            if self.is_tissue(px) {
                tissue += 1;
            } else if self.is_sclera(px) {
                sclera += 1;
            }
            samples += 1;
        }
        let samples = samples.max(1) as f32;
        LineProfile {
            position: y,
            tissue: tissue as f32 / samples,
            sclera: sclera as f32 / samples,
        }
    }

    fn column_tissue(&self, grid: &PixelGrid, x: u32, y0: u32, y1: u32) -> f32 {
        let mut tissue = 0u32;
        let mut samples = 0u32;
        for y in (y0..y1).step_by(self.config.sample_step as usize) {
            if self.is_tissue(grid.get_pixel(x, y)) {
                tissue += 1;
            }
            samples += 1;
        }
        tissue as f32 / samples.max(1) as f32
    }

    // One-pass mean/variance (Welford)
    fn luma_std(&self, grid: &PixelGrid, region: ImageRegion) -> f32 {
        let mut n = 0f32;
        let mut mean = 0f32;
        let mut m2 = 0f32;
        let step = self.config.sample_step as usize;
        for y in (region.y..region.y + region.height).step_by(step) {
            for x in (region.x..region.x + region.width).step_by(step) {
                let p = grid.get_pixel(x, y);
                let v = rgb_to_luma(p[0], p[1], p[2]);
                n += 1.0;
                let delta = v - mean;
                mean += delta / n;
                m2 += delta * (v - mean);
            }
        }
        if n < 2.0 {
            0.0
        } else {
            (m2 / (n - 1.0)).sqrt()
        }
    }

    fn normalize(
        &self,
        modality: Modality,
        grid: &PixelGrid,
        region: ImageRegion,
    ) -> Result<RegionCrop, PredictionError> {
        let sub = imageops::crop_imm(grid, region.x, region.y, region.width, region.height).to_image();
        let resized = imageops::resize(
            &sub,
            self.config.canonical_width,
            self.config.canonical_height,
            FilterType::Triangle,
        );
        RegionCrop::new(modality, resized).ok_or_else(|| PredictionError::InvalidRegion {
            modality,
            reason: "normalized crop is empty".to_string(),
        })
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self::new(RegionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::synthetic::{SyntheticTissue, conjunctiva_crop, eye_photo};
    use image::{ImageBuffer, Rgb};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn locates_tissue_band_in_eye_photo() {
        let mut rng = StdRng::seed_from_u64(7);
        let tissue = SyntheticTissue::new(0.3, 6.0);
        let photo = eye_photo(&mut rng, 200, 150, &tissue);

        let extractor = RegionExtractor::default();
        let region = extractor.locate_conjunctiva(&photo).unwrap();
        // The band is drawn between 55% and 72% of the height.
        assert!(region.y >= 76 && region.y <= 88, "band starts at {}", region.y);
        assert!(region.y + region.height <= 114);
        assert!(region.width > 100);

        let crop = extractor.extract(Modality::Eye, &photo).unwrap();
        assert_eq!(crop.dimensions(), (128, 64));
        assert_eq!(crop.modality(), Modality::Eye);
    }

    #[test]
    fn smooth_eye_photos_are_cropped_at_every_pallor() {
        let extractor = RegionExtractor::default();
        for pallor in [0.1, 0.5, 0.9] {
            for noise in [0.0, 2.0, 4.0] {
                let mut rng = StdRng::seed_from_u64(1);
                let photo = eye_photo(&mut rng, 200, 150, &SyntheticTissue::new(pallor, noise));
                let crop = extractor
                    .extract(Modality::Eye, &photo)
                    .unwrap_or_else(|e| panic!("pallor {pallor} noise {noise}: {e}"));
                assert_eq!(crop.dimensions(), (128, 64));
            }
        }
    }

    #[test]
    fn eye_photo_without_tissue_is_not_found() {
        let skin = ImageBuffer::from_fn(120, 90, |x, y| {
            Rgb([210, 160 + ((x + y) % 5) as u8, 115 + (x % 7) as u8])
        });
        let err = RegionExtractor::default()
            .extract(Modality::Eye, &skin)
            .unwrap_err();
        assert!(matches!(err, PredictionError::RegionNotFound { .. }));
    }

    #[test]
    fn pre_cropped_input_is_resized_to_canonical() {
        let mut rng = StdRng::seed_from_u64(3);
        let crop = conjunctiva_crop(&mut rng, 90, 70, &SyntheticTissue::new(0.8, 6.0));
        let normalized = RegionExtractor::default()
            .extract(Modality::Forniceal, &crop)
            .unwrap();
        assert_eq!(normalized.dimensions(), (128, 64));
        assert_eq!(normalized.modality(), Modality::Forniceal);
    }

    #[test]
    fn degenerate_pre_cropped_input_is_rejected() {
        let extractor = RegionExtractor::default();

        let blank = ImageBuffer::from_pixel(64, 64, Rgb([200, 120, 120]));
        let err = extractor.extract(Modality::Palpebral, &blank).unwrap_err();
        assert!(matches!(err, PredictionError::InvalidRegion { .. }));

        let tiny = ImageBuffer::from_fn(8, 40, |x, _| Rgb([200, 100 + x as u8 * 10, 100]));
        let err = extractor
            .extract(Modality::FornicealPalpebral, &tiny)
            .unwrap_err();
        assert!(matches!(err, PredictionError::InvalidRegion { .. }));
    }
}
