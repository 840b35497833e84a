/// Rectangular region of an image for focused analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full_image(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Builds a region from inclusive-exclusive bounds, clamped to the image.
    pub fn from_bounds(x0: u32, y0: u32, x1: u32, y1: u32, max_w: u32, max_h: u32) -> Self {
        let x1 = x1.min(max_w);
        let y1 = y1.min(max_h);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fraction_of(&self, width: u32, height: u32) -> f32 {
        let total = width as u64 * height as u64;
        if total == 0 {
            return 0.0;
        }
        self.area() as f32 / total as f32
    }
}
