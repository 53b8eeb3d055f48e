use depth_markers_detect::DetectError;
use depth_markers_pose::CalibrationError;

use crate::graph::{BufferId, GraphError, StageId};

/// Setup and per-frame environment errors of the pipeline.
///
/// A frame in which nothing is detected is not an error; it produces an
/// empty [`FrameOutput`](crate::FrameOutput).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("{stream} frame is {width}x{height}, expected {expected_width}x{expected_height}")]
    FrameSize {
        stream: &'static str,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
    #[error(transparent)]
    Resolution(#[from] DetectError),
    #[error("the pose stages need a depth frame")]
    MissingDepth,
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("stage {stage:?} ran before {buffer:?} was produced")]
    Unproduced { stage: StageId, buffer: BufferId },
}

/// File loading and saving errors.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("depth image must be 16-bit single channel, got {format}")]
    DepthFormat { format: String },
    #[error("pixel buffer does not fill a {width}x{height} image")]
    Shape { width: usize, height: usize },
}
