//! Stage 1: black/white classification of the color frame.

use depth_markers_core::{FrameSize, RgbImageView, Texel, TexelCodec, Texture};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::par;

/// Parameters of the "near-white" test.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Every channel must exceed this level (in `[0, 1]`).
    pub min_brightness: f32,
    /// Pairwise channel differences must stay below this, which keeps
    /// saturated colors from passing as white.
    pub max_channel_delta: f32,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            min_brightness: 0.35,
            max_channel_delta: 0.2,
        }
    }
}

impl ThresholdParams {
    #[inline]
    pub fn is_white(&self, [r, g, b]: [f32; 3]) -> bool {
        r > self.min_brightness
            && g > self.min_brightness
            && b > self.min_brightness
            && (r - g).abs() < self.max_channel_delta
            && (g - b).abs() < self.max_channel_delta
            && (b - r).abs() < self.max_channel_delta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shade {
    Black,
    White,
}

impl Shade {
    #[inline]
    pub fn is_white(self) -> bool {
        self == Shade::White
    }
}

impl TexelCodec for Shade {
    fn encode(&self, _frame: FrameSize) -> Texel {
        match self {
            Shade::White => [1.0; 4],
            Shade::Black => [0.0, 0.0, 0.0, 1.0],
        }
    }

    fn decode(texel: Texel, _frame: FrameSize) -> Self {
        if texel[0] > 0.5 {
            Shade::White
        } else {
            Shade::Black
        }
    }
}

/// Classify every pixel of the color frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = image.width, height = image.height))
)]
pub fn threshold(image: &RgbImageView<'_>, params: &ThresholdParams) -> Texture<Shade> {
    par::build(image.width, image.height, Shade::Black, |x, y| {
        if params.is_white(image.rgb_clamped(x as i32, y as i32)) {
            Shade::White
        } else {
            Shade::Black
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_markers_core::RgbImage;

    #[test]
    fn gray_levels_split_at_brightness_floor() {
        let p = ThresholdParams::default();
        assert!(p.is_white([1.0, 1.0, 1.0]));
        assert!(p.is_white([0.4, 0.4, 0.4]));
        assert!(!p.is_white([0.3, 0.3, 0.3]));
        assert!(!p.is_white([0.0, 0.0, 0.0]));
    }

    #[test]
    fn saturated_colors_are_black() {
        let p = ThresholdParams::default();
        assert!(!p.is_white([1.0, 0.5, 0.5]));
        assert!(!p.is_white([0.9, 0.9, 0.6]));
        assert!(p.is_white([0.9, 0.85, 0.8]));
    }

    #[test]
    fn threshold_maps_pixels() {
        let mut img = RgbImage::from_fn(4, 2, |_, _| [255, 255, 255]);
        img.fill_rect(1, 0, 1, 1, [0, 0, 0]);
        img.fill_rect(2, 1, 1, 1, [250, 20, 20]);
        let shades = threshold(&img.as_view(), &ThresholdParams::default());
        assert_eq!(shades.get(0, 0), Some(&Shade::White));
        assert_eq!(shades.get(1, 0), Some(&Shade::Black));
        assert_eq!(shades.get(2, 1), Some(&Shade::Black));
        assert_eq!(shades.get(3, 1), Some(&Shade::White));
    }
}
