//! Synthetic marker rendering for tests, benches and demos.
//!
//! The marker is a white square hole inside a black frame. The hole is
//! split into a 5×5 grid; the inner 3×3 cells carry the pattern read by
//! the decoder: three calibration cells and six code bits.

use depth_markers_core::RgbImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];

/// Grid cells that are always black.
const CALIBRATION_CELLS: [(usize, usize); 2] = [(1, 1), (3, 1)];

/// Grid cell of each code bit, least significant first.
const CODE_CELLS: [(usize, usize); 6] = [(1, 2), (2, 3), (2, 2), (2, 1), (3, 3), (3, 2)];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntheticMarker {
    /// 6-bit marker code.
    pub code: u8,
    /// Top-left pixel of the white hole.
    pub origin: [usize; 2],
    /// Side of the white hole in pixels.
    pub side: usize,
    /// Width of the black frame around the hole.
    pub border: usize,
}

impl SyntheticMarker {
    pub fn new(code: u8, origin: [usize; 2], side: usize, border: usize) -> Self {
        Self {
            code: code & 0x3f,
            origin,
            side,
            border,
        }
    }

    /// Geometric corners of the hole, clockwise from top-left.
    pub fn hole_corners(&self) -> [Point2<f32>; 4] {
        let [x0, y0] = self.origin.map(|v| v as f32);
        let s = self.side as f32;
        [
            Point2::new(x0, y0),
            Point2::new(x0 + s, y0),
            Point2::new(x0 + s, y0 + s),
            Point2::new(x0, y0 + s),
        ]
    }

    /// Paint the marker over `image`.
    pub fn draw(&self, image: &mut RgbImage) {
        let [x0, y0] = self.origin;
        let b = self.border.min(x0).min(y0);
        let outer = self.side + 2 * b;
        image.fill_rect(x0 - b, y0 - b, outer, outer, BLACK);
        image.fill_rect(x0, y0, self.side, self.side, WHITE);

        let cell = self.side as f32 / 5.0;
        let inner = (cell as usize).saturating_sub(4);
        let code_cells = CODE_CELLS
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.code & (1 << bit) != 0)
            .map(|(_, c)| c);
        for &(ci, cj) in CALIBRATION_CELLS.iter().chain(code_cells) {
            let cx = x0 + (ci as f32 * cell) as usize + 2;
            let cy = y0 + (cj as f32 * cell) as usize + 2;
            image.fill_rect(cx, cy, inner, inner, BLACK);
        }
    }

    /// Render the marker alone on a white frame.
    pub fn render(&self, width: usize, height: usize) -> RgbImage {
        let mut image = RgbImage::from_fn(width, height, |_, _| WHITE);
        self.draw(&mut image);
        image
    }
}
