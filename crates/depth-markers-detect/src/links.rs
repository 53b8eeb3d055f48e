//! Stage 6: follow each compacted corner along its edge to the next one.
//!
//! The chain is followed on the full-resolution (unrefined) corner
//! texture using the per-pixel link offsets, and every landing pixel is
//! checked against the compacted grid. Three phases with growing
//! tolerance bridge the pixels around the start corner, straight runs,
//! and finally any chain pixel, probing neighbouring cells to recover
//! from sampling gaps.

use depth_markers_core::{FrameSize, Texel, TexelCodec, Texture};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::compact::{cell_at, CompactCorner};
use crate::corners::{frame_length, CornerTexel};
use crate::par;

/// Hop budgets of the three resolver phases.
pub const LINK_HOP_BUDGETS: [usize; 3] = [4, 10, 5];

/// Source corner and the corner its start edge leads to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLink {
    pub source: Point2<i32>,
    pub next: Option<Point2<i32>>,
}

/// `(source.u, source.v, next.u, next.v)`, next zeroed when unresolved.
impl TexelCodec for EdgeLink {
    fn encode(&self, frame: FrameSize) -> Texel {
        let [u, v] = frame.pixel_to_tex(self.source);
        let [nu, nv] = self.next.map_or([0.0; 2], |n| frame.pixel_to_tex(n));
        [u, v, nu, nv]
    }

    fn decode(texel: Texel, frame: FrameSize) -> Self {
        let [u, v, nu, nv] = texel;
        Self {
            source: frame.tex_to_pixel([u, v]),
            next: (nu != 0.0 || nv != 0.0).then(|| frame.tex_to_pixel([nu, nv])),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParams {
    /// Leaving this radius (pixels of frame width) around the source
    /// ends the first phase.
    pub max_curve_length: f32,
    /// Distance of the neighbouring-cell probes, in pixels.
    pub probe_distance: i32,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            max_curve_length: 16.0,
            probe_distance: 5,
        }
    }
}

/// Chain-value band `(lo, hi)`, exclusive.
#[inline]
fn within(value: f32, (lo, hi): (f32, f32)) -> bool {
    value > lo && value < hi
}

/// Bent or straight lines (and near-straight corners).
const NEAR_BAND: (f32, f32) = (0.09, 0.31);
/// Straight and through lines.
const STRAIGHT_BAND: (f32, f32) = (0.29, 0.6);
/// Any line and any corner that bends at all.
const CHAIN_BAND: (f32, f32) = (0.0, 0.6);

struct Walker<'a> {
    compact: &'a Texture<Option<CompactCorner>>,
    corners: &'a Texture<CornerTexel>,
    source: Point2<i32>,
    pos: Point2<i32>,
    texel: CornerTexel,
    found: Option<CompactCorner>,
}

impl<'a> Walker<'a> {
    fn new(
        compact: &'a Texture<Option<CompactCorner>>,
        corners: &'a Texture<CornerTexel>,
        start: &CompactCorner,
    ) -> Self {
        let pos = start.link_target();
        Self {
            compact,
            corners,
            source: start.position,
            pos,
            texel: *corners.at(pos),
            found: *cell_at(compact, pos),
        }
    }

    fn at_source(&self) -> bool {
        self.found.is_some_and(|c| c.position == self.source)
    }

    /// Jump by the link of the current pixel; `false` when it has none.
    fn hop(&mut self) -> bool {
        let Some(link) = self.texel.link() else {
            return false;
        };
        self.pos += link.vector();
        self.texel = *self.corners.at(self.pos);
        self.found = *cell_at(self.compact, self.pos);
        true
    }

    /// Look for a corner in the cells around the current pixel.
    fn probe(&mut self, offsets: &[(i32, i32)], distance: i32) -> bool {
        self.found = offsets.iter().find_map(|&(dx, dy)| {
            *cell_at(self.compact, self.pos + Vector2::new(dx, dy) * distance)
        });
        self.found.is_some()
    }
}

const AXIS_PROBES: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const ALL_PROBES: [(i32, i32); 8] = [
    (0, 1),
    (0, -1),
    (1, 0),
    (-1, 0),
    (1, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
];

fn resolve(
    compact: &Texture<Option<CompactCorner>>,
    corners: &Texture<CornerTexel>,
    start: &CompactCorner,
    frame: FrameSize,
    params: &LinkParams,
) -> EdgeLink {
    let [near_hops, straight_hops, chain_hops] = LINK_HOP_BUDGETS;
    let mut walk = Walker::new(compact, corners, start);

    // Leave the source corner.
    let mut hops = 0;
    while hops < near_hops && (walk.at_source() || within(walk.texel.chain_value(), NEAR_BAND)) {
        if !walk.hop() {
            break;
        }
        hops += 1;
        if frame_length(walk.pos - walk.source, frame) > params.max_curve_length {
            break;
        }
    }

    // Run along straight segments.
    let mut hops = 0;
    while hops < straight_hops
        && walk.found.is_none()
        && within(walk.texel.chain_value(), STRAIGHT_BAND)
    {
        if !walk.hop() {
            break;
        }
        if walk.found.is_none() && hops > 1 && walk.probe(&AXIS_PROBES, params.probe_distance) {
            break;
        }
        hops += 1;
    }

    // Follow whatever chain remains.
    let mut hops = 0;
    while hops < chain_hops && walk.found.is_none() && within(walk.texel.chain_value(), CHAIN_BAND)
    {
        if !walk.hop() || walk.found.is_some() {
            break;
        }
        if walk.probe(&ALL_PROBES, params.probe_distance) {
            break;
        }
        hops += 1;
    }

    EdgeLink {
        source: start.position,
        next: walk
            .found
            .map(|c| c.position)
            .filter(|&p| p != start.position),
    }
}

/// Resolve the next corner for every compacted corner.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(cells_x = compact.width(), cells_y = compact.height()))
)]
pub fn resolve_links(
    compact: &Texture<Option<CompactCorner>>,
    corners: &Texture<CornerTexel>,
    params: &LinkParams,
) -> Texture<Option<EdgeLink>> {
    let frame = FrameSize::new(corners.width(), corners.height());
    par::build(compact.width(), compact.height(), None, |i, j| {
        compact
            .get(i, j)
            .copied()
            .flatten()
            .map(|start| resolve(compact, corners, &start, frame, params))
    })
}
