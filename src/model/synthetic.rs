//! Procedural conjunctiva and eye images spanning the pallor range.
//!
//! The bundled trainer fits on these when no artifact exists, and tests use
//! them as fixtures.
use image::{Rgb, RgbImage};
use rand::Rng;

const HEALTHY_TISSUE: [f32; 3] = [188.0, 62.0, 72.0];
const PALE_TISSUE: [f32; 3] = [226.0, 170.0, 172.0];
const SKIN: [f32; 3] = [214.0, 158.0, 104.0];
const SCLERA: [f32; 3] = [236.0, 234.0, 228.0];
const IRIS: [f32; 3] = [92.0, 62.0, 40.0];
const PUPIL: [f32; 3] = [18.0, 14.0, 12.0];
const VESSEL_TINT: [f32; 3] = [0.85, 0.6, 0.6];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTissue {
    /// 0.0 is well-perfused tissue, 1.0 fully pale.
    pub pallor: f32,
    /// Per-channel uniform noise amplitude on the 0-255 scale.
    pub noise: f32,
}

impl SyntheticTissue {
    pub fn new(pallor: f32, noise: f32) -> Self {
        Self {
            pallor: pallor.clamp(0.0, 1.0),
            noise: noise.max(0.0),
        }
    }

    pub fn base_color(&self) -> [f32; 3] {
        let t = self.pallor;
        [0, 1, 2].map(|c| HEALTHY_TISSUE[c] + (PALE_TISSUE[c] - HEALTHY_TISSUE[c]) * t)
    }
}

struct Vessel {
    row: f32,
    amplitude: f32,
    frequency: f32,
}

fn shade<R: Rng>(rng: &mut R, color: [f32; 3], noise: f32) -> Rgb<u8> {
    Rgb(color.map(|c| {
        let jitter = if noise > 0.0 {
            rng.random_range(-noise..=noise)
        } else {
            0.0
        };
        (c + jitter).round().clamp(0.0, 255.0) as u8
    }))
}

fn tint(color: [f32; 3], factor: [f32; 3]) -> [f32; 3] {
    [0, 1, 2].map(|c| color[c] * factor[c])
}

/// An already-cropped conjunctiva patch with a few meandering vessels.
pub fn conjunctiva_crop<R: Rng>(
    rng: &mut R,
    width: u32,
    height: u32,
    tissue: &SyntheticTissue,
) -> RgbImage {
    let base = tissue.base_color();
    let vessel_color = tint(base, VESSEL_TINT);
    let vessels: Vec<Vessel> = (0..3)
        .map(|_| Vessel {
            row: rng.random_range(0.0..height.max(1) as f32),
            amplitude: rng.random_range(1.0..4.0),
            frequency: rng.random_range(0.02..0.12),
        })
        .collect();

    let mut image = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let on_vessel = vessels.iter().any(|v| {
                let center = v.row + v.amplitude * (x as f32 * v.frequency).sin();
                (y as f32 - center).abs() < 1.2
            });
            let color = if on_vessel { vessel_color } else { base };
            let px = shade(rng, color, tissue.noise);
            image.put_pixel(x, y, px);
        }
    }
    image
}

/// A frontal eye photograph with the lower lid pulled down: skin, a sclera
/// band with iris and pupil between 25% and 50% of the height, and the exposed
/// conjunctiva between 55% and 72%.
pub fn eye_photo<R: Rng>(
    rng: &mut R,
    width: u32,
    height: u32,
    tissue: &SyntheticTissue,
) -> RgbImage {
    let base = tissue.base_color();
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let (iris_x, iris_y) = (w / 2.0, h * 0.375);
    let iris_radius = h * 0.12;
    let pupil_radius = h * 0.05;

    let mut image = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (fx, fy) = (x as f32 / w, y as f32 / h);
            let distance = ((x as f32 - iris_x).powi(2) + (y as f32 - iris_y).powi(2)).sqrt();
            let color = if (0.55..0.72).contains(&fy) && (0.15..0.85).contains(&fx) {
                base
            } else if distance < pupil_radius {
                PUPIL
            } else if distance < iris_radius {
                IRIS
            } else if (0.25..0.5).contains(&fy) && (0.1..0.9).contains(&fx) {
                SCLERA
            } else {
                SKIN
            };
            let px = shade(rng, color, tissue.noise);
            image.put_pixel(x, y, px);
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generation_is_seeded() {
        let tissue = SyntheticTissue::new(0.6, 5.0);
        let a = conjunctiva_crop(&mut StdRng::seed_from_u64(9), 40, 30, &tissue);
        let b = conjunctiva_crop(&mut StdRng::seed_from_u64(9), 40, 30, &tissue);
        assert_eq!(a, b);
        let c = eye_photo(&mut StdRng::seed_from_u64(9), 40, 30, &tissue);
        let d = eye_photo(&mut StdRng::seed_from_u64(9), 40, 30, &tissue);
        assert_eq!(c, d);
    }

    #[test]
    fn pallor_interpolates_base_color() {
        assert_eq!(SyntheticTissue::new(0.0, 0.0).base_color(), HEALTHY_TISSUE);
        assert_eq!(SyntheticTissue::new(2.0, 0.0).base_color(), PALE_TISSUE);
    }
}
