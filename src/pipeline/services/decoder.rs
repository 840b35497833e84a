use std::io::Cursor;

use image::{ImageReader, Limits};
use tracing::debug;

use crate::common::RawImage;
use crate::config::PipelineConfiguration;
use crate::error::PredictionError;
use crate::pipeline::types::PixelGrid;

/// Turns uploaded bytes into an RGB pixel grid.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_image_bytes: usize,
    max_image_dimension: u32,
}

impl ImageDecoder {
    pub fn new(config: &PipelineConfiguration) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            max_image_dimension: config.max_image_dimension,
        }
    }

    pub fn decode(&self, raw: &RawImage) -> Result<PixelGrid, PredictionError> {
        let modality = raw.modality();
        let fail = |reason: String| PredictionError::Decode { modality, reason };

        if raw.is_empty() {
            return Err(fail("image is empty".to_string()));
        }
        if raw.len() > self.max_image_bytes {
            return Err(fail(format!(
                "image is {} bytes, limit is {}",
                raw.len(),
                self.max_image_bytes
            )));
        }

        let mut reader = ImageReader::new(Cursor::new(raw.bytes()))
            .with_guessed_format()
            .map_err(|e| fail(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| fail("unrecognized image encoding".to_string()))?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_image_dimension);
        limits.max_image_height = Some(self.max_image_dimension);
        reader.limits(limits);

        let image = reader.decode().map_err(|e| fail(e.to_string()))?;
        let grid = image.to_rgb8();
        if grid.width() == 0 || grid.height() == 0 {
            return Err(fail("image has no pixels".to_string()));
        }

        debug!(
            "Decoded {} image as {:?}: {}x{}",
            modality,
            format,
            grid.width(),
            grid.height()
        );
        Ok(grid)
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(&PipelineConfiguration::default())
    }
}
