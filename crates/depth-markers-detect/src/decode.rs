//! Stage 7: closed quadrilaterals and their 6-bit codes.
//!
//! A marker is the white square hole inside a black frame. Its four
//! corners link into a cycle `c0 -> c1 -> c2 -> c3 -> c0` running clockwise
//! on screen, and points inside it are addressed bilinearly:
//! `p(u, v) = lerp(lerp(c0, c3, v), lerp(c1, c2, v), u)`.
//!
//! Three calibration cells fix the orientation; six more carry the code.

use depth_markers_core::{FrameSize, Texel, TexelCodec, Texture};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::compact::{cell_at, COMPACT_FACTOR};
use crate::corners::CornerTexel;
use crate::links::EdgeLink;
use crate::par;

/// Width and height of a decoder cell in full-resolution pixels.
pub const DECODE_CELL: (usize, usize) = (40, 30);

/// Multiplier separating the code from the corner packing in channel 0.
pub const CODE_SCALE: f32 = 1024.0;

/// Largest frame width the corner packing can carry.
pub const MAX_PACKED_WIDTH: usize = 1023;

/// `(u, v)` cells that must read black, black, white.
const CALIBRATION: [((f32, f32), bool); 3] = [
    ((0.339, 0.339), true),
    ((0.66, 0.339), true),
    ((0.339, 0.66), false),
];

/// `(u, v)` sample of each code bit, least significant first.
pub const CODE_SAMPLES: [(f32, f32); 6] = [
    (0.339, 0.5),
    (0.5, 0.66),
    (0.5, 0.5),
    (0.5, 0.339),
    (0.66, 0.66),
    (0.66, 0.5),
];

/// Decoded marker: code and the four chain corners as pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub code: u8,
    pub corners: [Point2<i32>; 4],
}

impl MarkerRecord {
    /// Corner pixel centers in image coordinates.
    pub fn corner_centers(&self) -> [Point2<f32>; 4] {
        self.corners
            .map(|c| Point2::new(c.x as f32 + 0.5, c.y as f32 + 0.5))
    }

    /// Bilinear point inside the quad, in image coordinates.
    pub fn point_at(&self, u: f32, v: f32) -> Point2<f32> {
        quad_point(&self.corner_centers(), u, v)
    }
}

fn quad_point(c: &[Point2<f32>; 4], u: f32, v: f32) -> Point2<f32> {
    let left = c[0] + (c[3] - c[0]) * v;
    let right = c[1] + (c[2] - c[1]) * v;
    left + (right - left) * u
}

/// Channel 0 carries `code * 1024`, channels 0-1 and 2-3 carry the pixel
/// of corners 2 and 3 in their integer parts and the normalized centers of
/// corners 0 and 1 in their fractions. Only `code` and corners 2, 3
/// survive exactly; f32 precision limits the fractions.
impl TexelCodec for MarkerRecord {
    fn encode(&self, frame: FrameSize) -> Texel {
        let [u0, v0] = frame.pixel_to_tex(self.corners[0]);
        let [u1, v1] = frame.pixel_to_tex(self.corners[1]);
        let c2 = self.corners[2];
        let c3 = self.corners[3];
        [
            pack(self.code as i32 * CODE_SCALE as i32 + c2.x, u0),
            pack(c2.y, v0),
            pack(c3.x, u1),
            pack(c3.y, v1),
        ]
    }

    fn decode(texel: Texel, frame: FrameSize) -> Self {
        let [r, g, b, a] = texel;
        let whole = r.floor() as i32;
        let code = (whole / CODE_SCALE as i32) as u8;
        let c2x = whole % CODE_SCALE as i32;
        let fract = |v: f32| v - v.floor();
        Self {
            code,
            corners: [
                frame.tex_to_pixel([fract(r), fract(g)]),
                frame.tex_to_pixel([fract(b), fract(a)]),
                Point2::new(c2x, g.floor() as i32),
                Point2::new(b.floor() as i32, a.floor() as i32),
            ],
        }
    }
}

/// `whole + fract` rounded down so the fraction never carries into the
/// integer part.
fn pack(whole: i32, fract: f32) -> f32 {
    let v = whole as f32 + fract;
    let ceiling = (whole + 1) as f32;
    if v < ceiling {
        v
    } else {
        f32::from_bits(ceiling.to_bits() - 1)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderParams {
    /// Upper bound on `|cos|` between the two diagonals of a candidate
    /// quad. `None` disables the check.
    pub max_diagonal_cos: Option<f32>,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            max_diagonal_cos: Some(0.06),
        }
    }
}

struct QuadSampler<'a> {
    corners: &'a Texture<CornerTexel>,
    quad: [Point2<f32>; 4],
}

impl QuadSampler<'_> {
    fn is_black(&self, (u, v): (f32, f32)) -> bool {
        let p = quad_point(&self.quad, u, v);
        !self
            .corners
            .clamped(p.x.floor() as i32, p.y.floor() as i32)
            .is_white()
    }

    fn code(&self) -> u8 {
        CODE_SAMPLES
            .iter()
            .enumerate()
            .filter(|(_, &uv)| self.is_black(uv))
            .fold(0u8, |code, (bit, _)| code | (1 << bit))
    }
}

/// `|cos|` of the angle between the quad diagonals; `None` if degenerate.
fn diagonal_cos(q: &[Point2<f32>; 4]) -> Option<f32> {
    let d1: Vector2<f32> = q[2] - q[0];
    let d2: Vector2<f32> = q[3] - q[1];
    let n = d1.norm() * d2.norm();
    (n > f32::EPSILON).then(|| (d1.dot(&d2) / n).abs())
}

/// Follow four links from `start`; the cycle must close on `start` after
/// visiting four different corners.
fn closed_quad(links: &Texture<Option<EdgeLink>>, start: &EdgeLink) -> Option<[Point2<i32>; 4]> {
    let step = |l: &EdgeLink| l.next.and_then(|n| *cell_at(links, n));
    let l1 = step(start)?;
    let l2 = step(&l1)?;
    let l3 = step(&l2)?;
    let quad = [start.source, l1.source, l2.source, l3.source];
    let distinct = (0..4).all(|i| (i + 1..4).all(|j| quad[i] != quad[j]));
    (distinct && l3.next == Some(start.source)).then_some(quad)
}

fn decode_candidate(
    links: &Texture<Option<EdgeLink>>,
    corners: &Texture<CornerTexel>,
    start: &EdgeLink,
    params: &DecoderParams,
) -> Option<MarkerRecord> {
    let pixels = closed_quad(links, start)?;
    let record = MarkerRecord {
        code: 0,
        corners: pixels,
    };
    let sampler = QuadSampler {
        corners,
        quad: record.corner_centers(),
    };
    if let Some(max_cos) = params.max_diagonal_cos {
        if diagonal_cos(&sampler.quad)? >= max_cos {
            return None;
        }
    }
    if !CALIBRATION
        .iter()
        .all(|&(uv, black)| sampler.is_black(uv) == black)
    {
        return None;
    }
    Some(MarkerRecord {
        code: sampler.code(),
        ..record
    })
}

/// Decode at most one marker per 40×30 cell; the first valid start
/// corner in row-major order of the cell's 8×6 link records wins.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(cells_x = links.width(), cells_y = links.height()))
)]
pub fn decode_markers(
    links: &Texture<Option<EdgeLink>>,
    corners: &Texture<CornerTexel>,
    params: &DecoderParams,
) -> Texture<Option<MarkerRecord>> {
    let (cw, ch) = DECODE_CELL;
    let (sx, sy) = (cw / COMPACT_FACTOR, ch / COMPACT_FACTOR);
    par::build(corners.width() / cw, corners.height() / ch, None, |i, j| {
        (j * sy..(j + 1) * sy)
            .flat_map(|y| (i * sx..(i + 1) * sx).map(move |x| (x, y)))
            .filter_map(|(x, y)| links.get(x, y).copied().flatten())
            .find_map(|start| decode_candidate(links, corners, &start, params))
    })
}
