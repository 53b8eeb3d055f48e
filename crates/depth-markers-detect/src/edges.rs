//! Stage 2: edge classification of black pixels.

use depth_markers_core::{FrameSize, Texel, TexelCodec, Texture};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::direction::{Direction, EdgeCode, EdgeDirectionTable};
use crate::par;
use crate::threshold::Shade;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum EdgeTexel {
    White,
    /// Black pixel whose neighbourhood is not a single edge run.
    NotEdge,
    Edge(EdgeCode),
}

impl EdgeTexel {
    #[inline]
    pub fn code(&self) -> Option<EdgeCode> {
        match self {
            EdgeTexel::Edge(code) => Some(*code),
            _ => None,
        }
    }
}

impl TexelCodec for EdgeTexel {
    fn encode(&self, _frame: FrameSize) -> Texel {
        match self {
            EdgeTexel::White => [1.0; 4],
            EdgeTexel::NotEdge => [0.0, 0.0, 0.0, 1.0],
            EdgeTexel::Edge(code) => [code.gradient, code.start.turns(), code.end.turns(), 1.0],
        }
    }

    fn decode(texel: Texel, _frame: FrameSize) -> Self {
        let [gradient, start, end, _] = texel;
        if start == end {
            // An edge run always has distinct start and end.
            if start > 0.5 {
                EdgeTexel::White
            } else {
                EdgeTexel::NotEdge
            }
        } else {
            EdgeTexel::Edge(EdgeCode {
                gradient,
                start: Direction::from_turns(start),
                end: Direction::from_turns(end),
            })
        }
    }
}

/// Neighbour mask of pixel `(x, y)`: bit `k` set when neighbour `k` is white.
#[inline]
pub fn neighbour_mask(shades: &Texture<Shade>, x: i32, y: i32) -> u8 {
    Direction::ALL.iter().fold(0u8, |mask, dir| {
        let o = dir.offset();
        if shades.clamped(x + o.x, y + o.y).is_white() {
            mask | (1 << dir.index())
        } else {
            mask
        }
    })
}

/// Tag every black pixel with its edge code.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = shades.width(), height = shades.height()))
)]
pub fn classify_edges(shades: &Texture<Shade>, table: &EdgeDirectionTable) -> Texture<EdgeTexel> {
    par::build(shades.width(), shades.height(), EdgeTexel::White, |x, y| {
        let Some(&shade) = shades.get(x, y) else {
            return EdgeTexel::White;
        };
        if shade.is_white() {
            return EdgeTexel::White;
        }
        match table.lookup(neighbour_mask(shades, x as i32, y as i32)) {
            Some(code) => EdgeTexel::Edge(code),
            None => EdgeTexel::NotEdge,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(w: usize, h: usize, x0: usize, y0: usize, side: usize) -> Texture<Shade> {
        Texture::from_fn(w, h, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                Shade::Black
            } else {
                Shade::White
            }
        })
    }

    #[test]
    fn square_boundary_is_edge_and_inside_is_not() {
        let shades = square(12, 12, 3, 3, 6);
        let edges = classify_edges(&shades, EdgeDirectionTable::shared());
        assert_eq!(edges.get(0, 0), Some(&EdgeTexel::White));
        assert_eq!(edges.get(5, 5), Some(&EdgeTexel::NotEdge));

        // Top side: black below, white above.
        let top = edges.get(5, 3).and_then(|e| e.code()).expect("top edge");
        assert_eq!(top.start, Direction::LEFT);
        assert_eq!(top.end, Direction::RIGHT);
        assert_eq!(top.gradient, 0.25);

        // Convex corner pixel has only three black neighbours: an edge.
        assert!(edges.get(3, 3).and_then(|e| e.code()).is_some());
    }

    #[test]
    fn codec_round_trips_every_table_entry() {
        let frame = FrameSize::new(8, 8);
        for mask in 0..=255u8 {
            if let Some(code) = EdgeDirectionTable::shared().lookup(mask) {
                let texel = EdgeTexel::Edge(code);
                assert_eq!(EdgeTexel::decode(texel.encode(frame), frame), texel);
            }
        }
        assert_eq!(EdgeTexel::decode([1.0; 4], frame), EdgeTexel::White);
        assert_eq!(EdgeTexel::decode([0.0, 0.0, 0.0, 1.0], frame), EdgeTexel::NotEdge);
    }
}
