use crate::decode::{DECODE_CELL, MAX_PACKED_WIDTH};

/// Errors returned by the marker detector.
///
/// Only frames the detector cannot represent are errors; a frame without
/// markers is a normal, empty detection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("frame is empty")]
    EmptyFrame,
    #[error(
        "frame size {width}x{height} is not a multiple of the {}x{} decoder cell",
        DECODE_CELL.0,
        DECODE_CELL.1
    )]
    Resolution { width: usize, height: usize },
    #[error("frame width {width} exceeds the packable maximum of {}", MAX_PACKED_WIDTH)]
    TooWide { width: usize },
}

/// Check that a frame can run through every detection stage.
pub fn check_frame_size(width: usize, height: usize) -> Result<(), DetectError> {
    if width == 0 || height == 0 {
        return Err(DetectError::EmptyFrame);
    }
    if width % DECODE_CELL.0 != 0 || height % DECODE_CELL.1 != 0 {
        return Err(DetectError::Resolution { width, height });
    }
    if width > MAX_PACKED_WIDTH {
        return Err(DetectError::TooWide { width });
    }
    Ok(())
}
