//! Depth-aided pose stages of the depth-markers pipeline.
//!
//! - [`DepthLifter`] scatters depth samples into color-aligned camera space,
//! - [`extract_poses`] turns decoded markers into rigid frames,
//! - [`CameraTracker`] reports camera movement against a reference marker.
//!
//! Calibration comes from a [`CalibrationProvider`]; the built-in provider
//! covers the RealSense families the detector was tuned on.

mod builtin;
mod calibration;
mod error;
mod lift;
mod pose;
mod tracker;

pub use calibration::{
    BuiltinCalibrations, CalibrationProvider, CameraCalibration, CameraModel, CaptureNegotiation,
    DepthIntrinsicsEntry, Distortion, DistortionModel, Intrinsics, StreamRequest, StreamSettings,
};
pub use error::CalibrationError;
pub use lift::{DepthLifter, LiftParams};
pub use pose::{
    extract_poses, marker_pose, pack_poses, unpack_poses, MarkerPose, PoseParams, POSE_TEXELS,
};
pub use tracker::{CameraMovement, CameraTracker, TrackerParams};
