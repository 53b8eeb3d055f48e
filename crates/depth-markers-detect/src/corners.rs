//! Stage 3: corner detection by walking edge chains.
//!
//! From every edge pixel two arms of [`WALK_HOPS`] pixels are followed, one
//! along the `start` directions and one along the `end` directions. The
//! mean gradients of the near (hops 1-4) and far (hops 5-8) halves of each
//! arm tell straight lines from corners.

use depth_markers_core::{
    circular_diff, circular_mean4, FrameSize, Texel, TexelCodec, Texture,
};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::direction::{Direction, EdgeCode};
use crate::edges::EdgeTexel;
use crate::par;

/// Length of each arm walk.
pub const WALK_HOPS: usize = 8;

/// Near-straight test: both near gradients almost equal and the far
/// end also close.
const FLAT_FAR_DIFF: f32 = 0.15;
const FLAT_NEAR_DIFF: f32 = 0.094;
/// Inner angles above half a turn are reflex.
const REFLEX_LIMIT: f32 = 0.501;

/// Offset from a pixel to a later pixel on its chain, within `±8` px.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub dx: i32,
    pub dy: i32,
}

impl Link {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    #[inline]
    pub fn vector(self) -> Vector2<i32> {
        Vector2::new(self.dx, self.dy)
    }

    /// `(d + 8) / 16` per axis.
    #[inline]
    pub fn encode(self) -> [f32; 2] {
        [(self.dx + 8) as f32 / 16.0, (self.dy + 8) as f32 / 16.0]
    }

    #[inline]
    pub fn decode([x, y]: [f32; 2]) -> Self {
        Self {
            dx: (x * 16.0 - 8.0).round() as i32,
            dy: (y * 16.0 - 8.0).round() as i32,
        }
    }
}

/// How straight the chain through a non-corner pixel is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    /// The two arms turn; linked 3 hops along the start arm.
    Bent,
    /// The near halves agree but the start arm bends further out; linked 3 hops.
    Straight,
    /// Straight over the whole start arm; linked 8 hops.
    Through,
}

impl LineKind {
    #[inline]
    pub fn flag(self) -> f32 {
        match self {
            LineKind::Bent => 0.1,
            LineKind::Straight => 0.3,
            LineKind::Through => 0.5,
        }
    }

    fn from_flag(flag: f32) -> Self {
        if flag > 0.4 {
            LineKind::Through
        } else if flag > 0.2 {
            LineKind::Straight
        } else {
            LineKind::Bent
        }
    }
}

/// Non-maximum suppression state of a corner candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Peak {
    Unrefined,
    LocalMax,
    Suppressed,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerCandidate {
    /// Mean direction change between the two arms, in turns.
    pub angle: f32,
    /// Bending within the arms; lower is straighter.
    pub straightness: f32,
    pub link: Link,
    pub peak: Peak,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CornerTexel {
    White,
    /// Black pixel off any edge.
    NotEdge,
    /// Edge pixel whose walk left the edge within [`WALK_HOPS`].
    Broken,
    Line { kind: LineKind, link: Link },
    Corner(CornerCandidate),
}

impl CornerTexel {
    #[inline]
    pub fn is_white(&self) -> bool {
        matches!(self, CornerTexel::White)
    }

    #[inline]
    pub fn candidate(&self) -> Option<&CornerCandidate> {
        match self {
            CornerTexel::Corner(c) => Some(c),
            _ => None,
        }
    }

    #[inline]
    pub fn is_local_max(&self) -> bool {
        matches!(self, CornerTexel::Corner(c) if c.peak == Peak::LocalMax)
    }

    /// Chain continuation offset, for lines and corners.
    #[inline]
    pub fn link(&self) -> Option<Link> {
        match self {
            CornerTexel::Line { link, .. } => Some(*link),
            CornerTexel::Corner(c) => Some(c.link),
            _ => None,
        }
    }

    /// Second channel of the packed texel: the line flag for lines, the
    /// straightness for unrefined corners. The edge-link resolver
    /// classifies chain pixels by this value.
    #[inline]
    pub fn chain_value(&self) -> f32 {
        self.channels()[1]
    }

    fn channels(&self) -> Texel {
        match self {
            CornerTexel::White => [1.0; 4],
            CornerTexel::NotEdge | CornerTexel::Broken => [0.0, 0.0, 0.0, 1.0],
            CornerTexel::Line { kind, link } => {
                let [lx, ly] = link.encode();
                [0.0, kind.flag(), lx, ly]
            }
            CornerTexel::Corner(c) => {
                let [lx, ly] = c.link.encode();
                match c.peak {
                    Peak::Unrefined => [c.angle, c.straightness, lx, ly],
                    Peak::LocalMax => [LOCAL_MAX_MARK, lx, ly, 1.0],
                    Peak::Suppressed => [c.angle, Peak::SUPPRESSED_MARK, lx, ly],
                }
            }
        }
    }
}

/// Channel-0 value of a confirmed local maximum.
pub const LOCAL_MAX_MARK: f32 = 0.9;

impl Peak {
    const SUPPRESSED_MARK: f32 = 0.3;
}

/// `Broken` packs like `NotEdge` and decodes as `NotEdge`; a local
/// maximum loses its angle and straightness when packed.
impl TexelCodec for CornerTexel {
    fn encode(&self, _frame: FrameSize) -> Texel {
        self.channels()
    }

    fn decode(texel: Texel, _frame: FrameSize) -> Self {
        let [r, g, b, a] = texel;
        if r > 0.99 {
            return CornerTexel::White;
        }
        if r == 0.0 {
            return if g == 0.0 {
                CornerTexel::NotEdge
            } else {
                CornerTexel::Line {
                    kind: LineKind::from_flag(g),
                    link: Link::decode([b, a]),
                }
            };
        }
        if r > 0.85 && r < 0.95 {
            return CornerTexel::Corner(CornerCandidate {
                angle: r,
                straightness: 0.0,
                link: Link::decode([g, b]),
                peak: Peak::LocalMax,
            });
        }
        let peak = if g == Peak::SUPPRESSED_MARK {
            Peak::Suppressed
        } else {
            Peak::Unrefined
        };
        CornerTexel::Corner(CornerCandidate {
            angle: r,
            straightness: g,
            link: Link::decode([b, a]),
            peak,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerParams {
    /// Gradient difference (turns) under which two arm halves count as
    /// the same line.
    pub line_tolerance: f32,
    /// Maximum summed bending inside the two arms for a corner.
    pub max_straightness: f32,
    /// Minimum distance from the pixel to either far arm end, in pixels
    /// of frame width.
    pub min_arm_length: f32,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            line_tolerance: 0.1,
            max_straightness: 0.105,
            min_arm_length: 8.0,
        }
    }
}

/// Length of a pixel offset measured in normalized texture units and
/// expressed in pixels of frame width (vertical steps count `w / h`).
#[inline]
pub(crate) fn frame_length(v: Vector2<i32>, frame: FrameSize) -> f32 {
    let aspect = frame.width as f32 / frame.height as f32;
    (v.x as f32).hypot(v.y as f32 * aspect)
}

struct Arm {
    codes: [EdgeCode; WALK_HOPS],
    positions: [Point2<i32>; WALK_HOPS],
}

impl Arm {
    /// Follow `step` from `origin`; `None` when a hop lands off the edge.
    fn walk(
        edges: &Texture<EdgeTexel>,
        origin: Point2<i32>,
        seed: EdgeCode,
        step: impl Fn(&EdgeCode) -> Direction,
    ) -> Option<Self> {
        let mut codes = [seed; WALK_HOPS];
        let mut positions = [origin; WALK_HOPS];
        let mut pos = origin;
        let mut dir = step(&seed);
        for hop in 0..WALK_HOPS {
            pos += dir.offset();
            let code = edges.at(pos).code()?;
            codes[hop] = code;
            positions[hop] = pos;
            dir = step(&code);
        }
        Some(Self { codes, positions })
    }

    fn gradient(&self, from: usize) -> f32 {
        let g = |i: usize| self.codes[from + i].gradient;
        circular_mean4(g(0), g(1), g(2), g(3))
    }

    fn near_direction(&self, pick: impl Fn(&EdgeCode) -> Direction) -> f32 {
        let d = |i: usize| pick(&self.codes[i]).turns();
        circular_mean4(d(0), d(1), d(2), d(3))
    }

    fn far(&self) -> Point2<i32> {
        self.positions[WALK_HOPS - 1]
    }
}

fn classify(
    edges: &Texture<EdgeTexel>,
    origin: Point2<i32>,
    frame: FrameSize,
    params: &CornerParams,
) -> CornerTexel {
    let seed = match edges.at(origin) {
        EdgeTexel::White => return CornerTexel::White,
        EdgeTexel::NotEdge => return CornerTexel::NotEdge,
        EdgeTexel::Edge(code) => *code,
    };
    let Some(start) = Arm::walk(edges, origin, seed, |c| c.start) else {
        return CornerTexel::Broken;
    };
    let Some(end) = Arm::walk(edges, origin, seed, |c| c.end) else {
        return CornerTexel::Broken;
    };

    let (start_near, start_far) = (start.gradient(0), start.gradient(4));
    let (end_near, end_far) = (end.gradient(0), end.gradient(4));
    let across_near = circular_diff(start_near, end_near);
    let start_bend = circular_diff(start_far, start_near);
    let end_bend = circular_diff(end_near, end_far);
    let across_far = circular_diff(end_far, start_far);

    let kind = if across_near < params.line_tolerance {
        if start_bend < params.line_tolerance {
            LineKind::Through
        } else {
            LineKind::Straight
        }
    } else {
        LineKind::Bent
    };
    let target = match kind {
        LineKind::Through => start.far(),
        _ => start.positions[2],
    };
    let link = Link::new(target.x - origin.x, target.y - origin.y);
    let line = CornerTexel::Line { kind, link };

    let flat = across_far < FLAT_FAR_DIFF && across_near < FLAT_NEAR_DIFF;
    let straightness = start_bend + end_bend;
    if flat || straightness > params.max_straightness {
        return line;
    }

    let start_dir = start.near_direction(|c| c.start);
    let end_dir = end.near_direction(|c| c.end);
    if (start_dir - end_dir + 1.0).rem_euclid(1.0) > REFLEX_LIMIT {
        return line;
    }

    if frame_length(start.far() - origin, frame) < params.min_arm_length
        || frame_length(end.far() - origin, frame) < params.min_arm_length
    {
        return line;
    }

    CornerTexel::Corner(CornerCandidate {
        angle: 0.5 * (across_near + across_far),
        straightness,
        link,
        peak: Peak::Unrefined,
    })
}

/// Classify every edge pixel as line, corner or broken chain.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = edges.width(), height = edges.height()))
)]
pub fn detect_corners(edges: &Texture<EdgeTexel>, params: &CornerParams) -> Texture<CornerTexel> {
    let frame = FrameSize::new(edges.width(), edges.height());
    par::build(edges.width(), edges.height(), CornerTexel::White, |x, y| {
        classify(edges, Point2::new(x as i32, y as i32), frame, params)
    })
}
