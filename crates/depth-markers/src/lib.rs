//! Depth-aided AR marker detection and camera tracking.
//!
//! This crate provides:
//! - re-exports of the stage crates,
//! - an explicit stage graph ([`StageGraph`]) validated once at build time,
//! - [`Pipeline`], which runs the graph frame by frame and keeps the camera
//!   tracker between frames,
//! - (feature `image`) frame loading helpers in [`io`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use depth_markers::{Frame, PipelineBuilder, PipelineConfig};
//! use depth_markers::pose::{BuiltinCalibrations, CalibrationProvider, CaptureNegotiation, StreamSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let color = depth_markers::io::load_color("color.png")?;
//! let depth = depth_markers::io::load_depth("depth.png")?;
//!
//! let calibration = BuiltinCalibrations.calibration("Intel RealSense SR300")?;
//! let negotiation = CaptureNegotiation {
//!     depth: StreamSettings { width: depth.width, height: depth.height, frame_rate: 30.0 },
//!     color: StreamSettings { width: color.width, height: color.height, frame_rate: 30.0 },
//! };
//! let mut pipeline = PipelineBuilder::new(PipelineConfig::default())
//!     .calibration(calibration, negotiation)
//!     .build()?;
//!
//! let out = pipeline.process(&Frame::new(color.as_view()).with_depth(depth.as_view()))?;
//! println!("{} markers, movement: {:?}", out.markers.len(), out.movement);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `depth_markers::core`: textures, texel codec, image views.
//! - `depth_markers::detect`: stages 1-7 and synthetic markers.
//! - `depth_markers::pose`: calibration, depth lifting, marker poses, tracking.

pub use depth_markers_core as core;
pub use depth_markers_detect as detect;
pub use depth_markers_pose as pose;

mod config;
mod error;
mod graph;
mod pipeline;

#[cfg(feature = "image")]
pub mod io;

pub use config::{read_json, write_json, PipelineConfig};
pub use error::{IoError, PipelineError};
pub use graph::{BufferId, GraphError, StageGraph, StageId, StageNode};
pub use pipeline::{Frame, FrameBuffers, FrameOutput, Pipeline, PipelineBuilder};

pub use depth_markers_detect::{MarkerDetector, MarkerRecord};
pub use depth_markers_pose::{CameraMovement, MarkerPose};
