//! Compass directions and the 256-entry edge direction table.
//!
//! Neighbours of a pixel are numbered counter-clockwise (as displayed)
//! starting at the right neighbour:
//!
//! ```text
//!  3 2 1
//!  4 . 0
//!  5 6 7
//! ```
//!
//! A neighbourhood is summarized as an 8-bit mask with bit `k` set when
//! neighbour `k` is white. A black pixel lies on an edge when its black
//! neighbours form exactly one circular run of 3 to 6 directions.

use std::sync::OnceLock;

use depth_markers_core::Texel;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

const OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Shortest and longest black run accepted as an edge.
const MIN_RUN: u32 = 3;
const MAX_RUN: u32 = 6;

/// One of the 8 neighbour directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction(u8);

impl Direction {
    pub const RIGHT: Direction = Direction(0);
    pub const UP: Direction = Direction(2);
    pub const LEFT: Direction = Direction(4);
    pub const DOWN: Direction = Direction(6);

    pub const ALL: [Direction; 8] = [
        Direction(0),
        Direction(1),
        Direction(2),
        Direction(3),
        Direction(4),
        Direction(5),
        Direction(6),
        Direction(7),
    ];

    pub fn new(index: u8) -> Option<Self> {
        (index < 8).then_some(Self(index))
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    /// Pixel step in image coordinates (`y` grows downward).
    #[inline]
    pub fn offset(self) -> Vector2<i32> {
        let (dx, dy) = OFFSETS[self.0 as usize];
        Vector2::new(dx, dy)
    }

    /// Direction as a fraction of a full turn.
    #[inline]
    pub fn turns(self) -> f32 {
        self.0 as f32 / 8.0
    }

    /// Nearest direction to an angle in turns.
    #[inline]
    pub fn from_turns(turns: f32) -> Self {
        Self(((turns * 8.0 + 0.5) as i32).rem_euclid(8) as u8)
    }

    fn rotated(self, steps: u8) -> Self {
        Self((self.0 + steps) % 8)
    }
}

/// Edge orientation of one black pixel.
///
/// `start` is the first black neighbour of the run (counter-clockwise)
/// and `end` the last one. Walking from the pixel towards `start` keeps
/// the black region on the left. `gradient` points away from the black
/// run and is allowed half steps (multiples of 1/16 turn).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeCode {
    pub gradient: f32,
    pub start: Direction,
    pub end: Direction,
}

impl EdgeCode {
    /// Evaluate a neighbour mask (bit `k` set = neighbour `k` is white).
    pub fn from_mask(mask: u8) -> Option<Self> {
        let changes = mask ^ mask.rotate_left(1);
        if changes.count_ones() != 2 {
            return None;
        }
        let first = changes.trailing_zeros() as u8;
        let second = 7 - changes.leading_zeros() as u8;

        // Bit `k` of `changes` marks a colour change between neighbours
        // `k - 1` and `k`, so each boundary is the first bit of a run.
        let (start, after_end, run) = if mask & (1 << first) != 0 {
            (second, first, 8 - u32::from(second - first))
        } else {
            (first, second, u32::from(second - first))
        };
        if !(MIN_RUN..=MAX_RUN).contains(&run) {
            return None;
        }
        let start = Direction(start);
        let end = Direction(after_end).rotated(7);
        let span = (start.0 + 8 - end.0) % 8;
        let gradient = ((end.0 as f32 + span as f32 / 2.0) % 8.0) / 8.0;
        Some(Self {
            gradient,
            start,
            end,
        })
    }
}

/// Lookup from neighbour mask to [`EdgeCode`], built once.
#[derive(Clone, Debug)]
pub struct EdgeDirectionTable {
    entries: [Option<EdgeCode>; 256],
}

impl Default for EdgeDirectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeDirectionTable {
    pub fn new() -> Self {
        let mut entries = [None; 256];
        for (mask, entry) in entries.iter_mut().enumerate() {
            *entry = EdgeCode::from_mask(mask as u8);
        }
        Self { entries }
    }

    /// Process-wide table.
    pub fn shared() -> &'static Self {
        static TABLE: OnceLock<EdgeDirectionTable> = OnceLock::new();
        TABLE.get_or_init(Self::new)
    }

    #[inline]
    pub fn lookup(&self, mask: u8) -> Option<EdgeCode> {
        self.entries[mask as usize]
    }

    pub fn edge_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// 256 packed entries: `(gradient, start/8, end/8, 1)` for edges,
    /// `(0, 0, 0, 1)` otherwise.
    pub fn to_texels(&self) -> Vec<Texel> {
        self.entries
            .iter()
            .map(|e| match e {
                Some(code) => [code.gradient, code.start.turns(), code.end.turns(), 1.0],
                None => [0.0, 0.0, 0.0, 1.0],
            })
            .collect()
    }
}
