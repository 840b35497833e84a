//! Per-pixel color conversions used by region localization and feature extraction.

/// Rec. 709 luminance on the 0-255 scale.
pub fn rgb_to_luma(r: u8, g: u8, b: u8) -> f32 {
    0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
}

/// Hue in degrees [0, 360), saturation and value in [0, 1].
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn srgb_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIE L*a*b* under D65. a* grows with redness, which pallor suppresses.
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = srgb_to_linear(r);
    let g = srgb_to_linear(g);
    let b = srgb_to_linear(b);

    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.08883;

    let fx = lab_f(x);
    let fy = lab_f(y);
    let fz = lab_f(z);

    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// True when `hue` lies in the window from `min` to `max`, wrapping through 0.
pub fn hue_in_window(hue: f32, min: f32, max: f32) -> bool {
    if min <= max {
        hue >= min && hue <= max
    } else {
        hue >= min || hue <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_of_primaries() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert!((h - 120.0).abs() < 1e-3);
        let (h, s, _) = rgb_to_hsv(128, 128, 128);
        assert_eq!((h, s), (0.0, 0.0));
    }

    #[test]
    fn lab_separates_red_from_pale_tissue() {
        let (_, red_a, _) = rgb_to_lab(190, 70, 75);
        let (_, pale_a, _) = rgb_to_lab(225, 180, 178);
        assert!(red_a > pale_a + 15.0);

        let (l, a, b) = rgb_to_lab(255, 255, 255);
        assert!((l - 100.0).abs() < 0.1);
        assert!(a.abs() < 0.5 && b.abs() < 0.5);
    }

    #[test]
    fn hue_window_wraps() {
        assert!(hue_in_window(350.0, 330.0, 20.0));
        assert!(hue_in_window(5.0, 330.0, 20.0));
        assert!(!hue_in_window(40.0, 330.0, 20.0));
        assert!(hue_in_window(40.0, 30.0, 50.0));
    }
}
