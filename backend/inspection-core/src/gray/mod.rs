//! Gray-pixel gate: is there a primed (gray) capot in front of the camera?
//!
//! Pixels are converted to 8-bit HSV on the 0..180 / 0..255 / 0..255 scale
//! and counted when all three channels fall inside an inclusive range.

use crate::collaborators::GrayGate;
use crate::error::pipeline::PipelineError;

use models::EncodedImage;

use image::Rgb;
use log::debug;

/// Low saturation, mid-to-high value.
pub const DEFAULT_LOWER_HSV: [u8; 3] = [0, 0, 50];
pub const DEFAULT_UPPER_HSV: [u8; 3] = [180, 30, 220];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvGrayGate {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl HsvGrayGate {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    fn in_range(&self, hsv: [u8; 3]) -> bool {
        hsv.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(value, (lo, hi))| lo <= value && value <= hi)
    }
}

impl Default for HsvGrayGate {
    fn default() -> Self {
        Self::new(DEFAULT_LOWER_HSV, DEFAULT_UPPER_HSV)
    }
}

impl GrayGate for HsvGrayGate {
    fn percentage(&self, image: &EncodedImage) -> Result<f32, PipelineError> {
        let decoded = image::load_from_memory(image.as_bytes())
            .map_err(|e| PipelineError::gray_gate(format!("Failed to decode image: {e}")))?;
        let rgb = decoded.to_rgb8();

        let total = rgb.width() as u64 * rgb.height() as u64;
        if total == 0 {
            return Err(PipelineError::gray_gate("Image has no pixels"));
        }

        let gray = rgb.pixels().filter(|px| self.in_range(rgb_to_hsv(**px))).count() as u64;
        let percentage = (gray as f64 / total as f64 * 100.0) as f32;

        debug!("Gray pixels: {gray}/{total} ({percentage:.2}%)");
        Ok(percentage)
    }
}

/// 8-bit RGB to HSV with hue halved into `0..=180`.
pub fn rgb_to_hsv(Rgb([r, g, b]): Rgb<u8>) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = f32::from(max - min);

    let v = max;
    let s = if max == 0 {
        0
    } else {
        (delta * 255.0 / f32::from(max)).round() as u8
    };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (f32::from(g) - f32::from(b)) / delta
    } else if max == g {
        120.0 + 60.0 * (f32::from(b) - f32::from(r)) / delta
    } else {
        240.0 + 60.0 * (f32::from(r) - f32::from(g)) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [(h / 2.0).round() as u8, s, v]
}
