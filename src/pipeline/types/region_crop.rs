use image::RgbImage;

use crate::common::Modality;

/// Decoded height x width x 3 grid of 8-bit channels.
pub type PixelGrid = RgbImage;

/// The normalized region of interest for one modality.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCrop {
    modality: Modality,
    pixels: RgbImage,
}

impl RegionCrop {
    /// Returns `None` for an empty grid; a crop always has at least one pixel.
    pub fn new(modality: Modality, pixels: RgbImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(Self { modality, pixels })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}
