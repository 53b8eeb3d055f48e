//! Stage 5: one corner per 5×5 cell.

use depth_markers_core::{FrameSize, Texel, TexelCodec, Texture};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::corners::{CornerTexel, Link, Peak};
use crate::par;

/// Side of a compaction cell in full-resolution pixels.
pub const COMPACT_FACTOR: usize = 5;

/// Confirmed corner of one coarse cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactCorner {
    /// Full-resolution pixel of the corner.
    pub position: Point2<i32>,
    /// Offset along the start arm of the corner.
    pub link: Link,
}

impl CompactCorner {
    /// Pixel the link points at.
    #[inline]
    pub fn link_target(&self) -> Point2<i32> {
        self.position + self.link.vector()
    }
}

/// `(u, v, link.x, link.y)` with `(u, v)` the normalized pixel center.
impl TexelCodec for CompactCorner {
    fn encode(&self, frame: FrameSize) -> Texel {
        let [u, v] = frame.pixel_to_tex(self.position);
        let [lx, ly] = self.link.encode();
        [u, v, lx, ly]
    }

    fn decode(texel: Texel, frame: FrameSize) -> Self {
        let [u, v, lx, ly] = texel;
        Self {
            position: frame.tex_to_pixel([u, v]),
            link: Link::decode([lx, ly]),
        }
    }
}

/// Record of the coarse cell containing full-resolution pixel `p`,
/// clamped to the frame.
#[inline]
pub fn cell_at<T>(coarse: &Texture<T>, p: Point2<i32>) -> &T {
    let f = COMPACT_FACTOR as i32;
    coarse.clamped(p.x.max(0) / f, p.y.max(0) / f)
}

/// Scan each 5×5 window row by row and keep the first local maximum.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = refined.width(), height = refined.height()))
)]
pub fn compact_corners(refined: &Texture<CornerTexel>) -> Texture<Option<CompactCorner>> {
    let w = refined.width() / COMPACT_FACTOR;
    let h = refined.height() / COMPACT_FACTOR;
    par::build(w, h, None, |i, j| {
        let xs = i * COMPACT_FACTOR..(i + 1) * COMPACT_FACTOR;
        (j * COMPACT_FACTOR..(j + 1) * COMPACT_FACTOR)
            .flat_map(|y| xs.clone().map(move |x| (x, y)))
            .find_map(|(x, y)| match refined.get(x, y) {
                Some(CornerTexel::Corner(c)) if c.peak == Peak::LocalMax => Some(CompactCorner {
                    position: Point2::new(x as i32, y as i32),
                    link: c.link,
                }),
                _ => None,
            })
    })
}
