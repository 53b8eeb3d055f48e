//! Stage 4: non-maximum suppression of corner candidates.

use depth_markers_core::Texture;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::corners::{CornerCandidate, CornerTexel, Peak};
use crate::par;

/// Neighbourhood visited around a candidate: the 8 pixels at Chebyshev
/// distance 1, then the 16 at distance 2.
pub const SUPPRESSION_OFFSETS: [(i32, i32); 24] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (2, 0),
    (2, -1),
    (2, -2),
    (1, -2),
    (0, -2),
    (-1, -2),
    (-2, -2),
    (-2, -1),
    (-2, 0),
    (-2, 1),
    (-2, 2),
    (-1, 2),
    (0, 2),
    (1, 2),
    (2, 2),
    (2, 1),
];

/// Candidates outside this angle range are left untouched.
const MIN_ANGLE: f32 = 0.01;
const MAX_ANGLE: f32 = 0.99;

/// Whether `other`, at offset `(dx, dy)`, wins over `candidate`.
///
/// Larger angle wins; then smaller straightness; then the neighbour to
/// the left, or straight above.
#[inline]
fn outranks(other: &CornerCandidate, candidate: &CornerCandidate, dx: i32, dy: i32) -> bool {
    if other.angle != candidate.angle {
        return other.angle > candidate.angle;
    }
    if other.straightness != candidate.straightness {
        return other.straightness < candidate.straightness;
    }
    dx < 0 || (dx == 0 && dy < 0)
}

fn refine_at(corners: &Texture<CornerTexel>, x: i32, y: i32) -> CornerTexel {
    let texel = *corners.clamped(x, y);
    let CornerTexel::Corner(candidate) = texel else {
        return texel;
    };
    let on_border =
        x == 0 || y == 0 || x + 1 == corners.width() as i32 || y + 1 == corners.height() as i32;
    if on_border || candidate.angle <= MIN_ANGLE || candidate.angle >= MAX_ANGLE {
        return texel;
    }
    let suppressed = SUPPRESSION_OFFSETS.iter().any(|&(dx, dy)| {
        corners
            .clamped(x + dx, y + dy)
            .candidate()
            .is_some_and(|other| outranks(other, &candidate, dx, dy))
    });
    CornerTexel::Corner(CornerCandidate {
        peak: if suppressed {
            Peak::Suppressed
        } else {
            Peak::LocalMax
        },
        ..candidate
    })
}

/// Mark each corner candidate as local maximum or suppressed.
///
/// Only the angle and straightness of neighbours are compared, and
/// neither changes here, so refining an already refined texture gives
/// the same result.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = corners.width(), height = corners.height()))
)]
pub fn refine_corners(corners: &Texture<CornerTexel>) -> Texture<CornerTexel> {
    par::build(corners.width(), corners.height(), CornerTexel::White, |x, y| {
        refine_at(corners, x as i32, y as i32)
    })
}
