/// Errors raised while resolving camera calibration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("Sorry, your camera '{label}' is not supported")]
    CameraNotSupported { label: String },
    #[error("Depth intrinsics for size {width}x{height} are not available.")]
    DepthIntrinsicsUnavailable { width: usize, height: usize },
}
