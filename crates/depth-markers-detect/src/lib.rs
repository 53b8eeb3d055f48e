//! Marker detection stages 1-7.
//!
//! Each stage is a pure function from typed textures to a typed texture:
//!
//! 1. [`threshold`] classifies pixels as black or white,
//! 2. [`classify_edges`] labels black pixels on a single edge run,
//! 3. [`detect_corners`] walks each edge both ways and classifies it,
//! 4. [`refine_corners`] keeps local maxima,
//! 5. [`compact_corners`] keeps one corner per 5×5 cell,
//! 6. [`resolve_links`] finds the corner each edge leads to,
//! 7. [`decode_markers`] closes four links into a quad and reads its code.
//!
//! [`MarkerDetector`] chains them and keeps every intermediate buffer.

mod compact;
mod corners;
mod decode;
mod detector;
mod direction;
mod edges;
mod error;
mod links;
mod par;
mod params;
mod refine;
mod synth;
mod threshold;

pub use compact::{cell_at, compact_corners, CompactCorner, COMPACT_FACTOR};
pub use corners::{
    detect_corners, CornerCandidate, CornerParams, CornerTexel, LineKind, Link, Peak,
    LOCAL_MAX_MARK, WALK_HOPS,
};
pub use decode::{
    decode_markers, DecoderParams, MarkerRecord, CODE_SAMPLES, CODE_SCALE, DECODE_CELL,
    MAX_PACKED_WIDTH,
};
pub use detector::{MarkerDetection, MarkerDetector};
pub use direction::{Direction, EdgeCode, EdgeDirectionTable};
pub use edges::{classify_edges, neighbour_mask, EdgeTexel};
pub use error::{check_frame_size, DetectError};
pub use links::{resolve_links, EdgeLink, LinkParams, LINK_HOP_BUDGETS};
pub use params::DetectParams;
pub use refine::{refine_corners, SUPPRESSION_OFFSETS};
pub use synth::SyntheticMarker;
pub use threshold::{threshold, Shade, ThresholdParams};
