//! Camera calibration contract and capture negotiation.

use depth_markers_core::FrameSize;
use nalgebra::{Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::builtin;
use crate::error::CalibrationError;

/// Depth camera families with built-in calibration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraModel {
    R200,
    Sr300,
    Zr300,
    /// D4xx family, reported with a `") 4"` label fragment.
    Generic4,
}

impl CameraModel {
    /// Match a device label by substring, first match wins.
    pub fn from_label(label: &str) -> Option<Self> {
        if label.contains("R200") {
            Some(Self::R200)
        } else if label.contains("Camera S") || label.contains("SR300") {
            Some(Self::Sr300)
        } else if label.contains("ZR300") {
            Some(Self::Zr300)
        } else if label.contains(") 4") {
            Some(Self::Generic4)
        } else {
            None
        }
    }
}

/// Pinhole intrinsics in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Principal point.
    pub offset: [f32; 2],
    pub focal_length: [f32; 2],
}

impl Intrinsics {
    /// Camera-space point at depth `z` seen through pixel `p`.
    #[inline]
    pub fn deproject(&self, p: Point2<f32>, z: f32) -> Point3<f32> {
        Point3::new(
            (p.x - self.offset[0]) / self.focal_length[0] * z,
            (p.y - self.offset[1]) / self.focal_length[1] * z,
            z,
        )
    }

    /// Pixel position of `q`; `None` for points at or behind the camera.
    #[inline]
    pub fn project(&self, q: &Point3<f32>) -> Option<Point2<f32>> {
        (q.z > 0.0).then(|| {
            Point2::new(
                q.x / q.z * self.focal_length[0] + self.offset[0],
                q.y / q.z * self.focal_length[1] + self.offset[1],
            )
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistortionModel {
    #[default]
    None,
    ModifiedBrownConrady,
    InverseBrownConrady,
}

/// Lens distortion as reported by the device. Carried for consumers; the
/// pipeline itself works with undistorted pinhole projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub model: DistortionModel,
    pub coeffs: [f32; 5],
}

impl Distortion {
    pub const NONE: Self = Self {
        model: DistortionModel::None,
        coeffs: [0.0; 5],
    };
}

/// Depth intrinsics valid for one depth stream resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthIntrinsicsEntry {
    pub width: usize,
    pub height: usize,
    pub intrinsics: Intrinsics,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub model: CameraModel,
    /// Metres per raw 16-bit depth unit.
    pub depth_scale: f32,
    pub depth_intrinsics: Vec<DepthIntrinsicsEntry>,
    pub color: Intrinsics,
    /// Column-major 4×4 transform from depth to color camera space:
    /// rotation in the upper-left 3×3, translation in elements 12..15.
    pub depth_to_color: [f32; 16],
    pub depth_distortion: Distortion,
    pub color_distortion: Distortion,
}

impl CameraCalibration {
    pub fn depth_intrinsics(
        &self,
        width: usize,
        height: usize,
    ) -> Result<Intrinsics, CalibrationError> {
        self.depth_intrinsics
            .iter()
            .find(|e| e.width == width && e.height == height)
            .map(|e| e.intrinsics)
            .ok_or(CalibrationError::DepthIntrinsicsUnavailable { width, height })
    }

    pub fn depth_to_color_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_column_slice(&self.depth_to_color)
    }

    /// Scale for depth delivered as normalized floats (`raw / 65535`).
    pub fn normalized_depth_scale(&self) -> f32 {
        self.depth_scale * 65535.0
    }
}

/// Source of calibration for a device label.
pub trait CalibrationProvider {
    fn calibration(&self, label: &str) -> Result<CameraCalibration, CalibrationError>;
}

/// Factory calibration of the supported RealSense families.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinCalibrations;

impl CalibrationProvider for BuiltinCalibrations {
    fn calibration(&self, label: &str) -> Result<CameraCalibration, CalibrationError> {
        let model =
            CameraModel::from_label(label).ok_or_else(|| CalibrationError::CameraNotSupported {
                label: label.to_owned(),
            })?;
        log::debug!("camera '{label}' uses built-in {model:?} calibration");
        Ok(builtin::calibration(model))
    }
}

/// Constraints for opening a stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub frame_rate: Option<f32>,
}

/// What the device actually delivers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub width: usize,
    pub height: usize,
    pub frame_rate: f32,
}

impl StreamSettings {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Negotiated depth and color streams.
///
/// Depth is first requested at 628 px and 110 fps, which selects the depth
/// rather than the IR stream on R200-class devices. Some drivers answer
/// with a rescaled high-rate stream; above 60 fps the request is repeated
/// at 30 fps and the device's native size. Color is always 640×480. The
/// two resolutions differ in general and the depth one selects the depth
/// intrinsics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureNegotiation {
    pub depth: StreamSettings,
    pub color: StreamSettings,
}

impl CaptureNegotiation {
    pub const MAX_DEPTH_FRAME_RATE: f32 = 60.01;

    pub const DEPTH_REQUEST: StreamRequest = StreamRequest {
        width: Some(628),
        height: None,
        frame_rate: Some(110.0),
    };

    pub const DEPTH_FALLBACK: StreamRequest = StreamRequest {
        width: None,
        height: None,
        frame_rate: Some(30.0),
    };

    pub const COLOR_REQUEST: StreamRequest = StreamRequest {
        width: Some(640),
        height: Some(480),
        frame_rate: None,
    };

    /// Run the depth then color requests through `open`.
    pub fn negotiate<E>(
        mut open: impl FnMut(&StreamRequest) -> Result<StreamSettings, E>,
    ) -> Result<Self, E> {
        let mut depth = open(&Self::DEPTH_REQUEST)?;
        if depth.frame_rate > Self::MAX_DEPTH_FRAME_RATE {
            log::info!(
                "depth stream came up at {} fps, reopening at 30 fps",
                depth.frame_rate
            );
            depth = open(&Self::DEPTH_FALLBACK)?;
        }
        let color = open(&Self::COLOR_REQUEST)?;
        Ok(Self { depth, color })
    }

    pub fn depth_intrinsics(
        &self,
        calibration: &CameraCalibration,
    ) -> Result<Intrinsics, CalibrationError> {
        calibration.depth_intrinsics(self.depth.width, self.depth.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn labels_select_models() {
        let cases = [
            ("Intel RealSense R200 Depth", Some(CameraModel::R200)),
            ("Intel(R) RealSense(TM) Camera SR300 Depth", Some(CameraModel::Sr300)),
            ("Intel RealSense 3D Camera S", Some(CameraModel::Sr300)),
            ("Intel RealSense ZR300 Depth", Some(CameraModel::Zr300)),
            ("Intel(R) RealSense(TM) 430 Depth", Some(CameraModel::Generic4)),
            ("Integrated Webcam", None),
        ];
        for (label, model) in cases {
            assert_eq!(CameraModel::from_label(label), model, "{label}");
        }
    }

    #[test]
    fn unsupported_camera_names_the_label() {
        let err = BuiltinCalibrations.calibration("Webcam").unwrap_err();
        assert_eq!(err.to_string(), "Sorry, your camera 'Webcam' is not supported");
    }

    #[test]
    fn depth_intrinsics_by_size() {
        let cal = BuiltinCalibrations.calibration("RealSense R200").unwrap();
        let wide = cal.depth_intrinsics(628, 469).unwrap();
        assert_eq!(wide.offset, [305.558075, 233.5]);
        assert!(cal.depth_intrinsics(628, 361).is_ok());
        let err = cal.depth_intrinsics(640, 480).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Depth intrinsics for size 640x480 are not available."
        );
    }

    #[test]
    fn extrinsics_are_column_major() {
        let cal = BuiltinCalibrations.calibration("SR300").unwrap();
        let m = cal.depth_to_color_matrix();
        assert_relative_eq!(m[(0, 3)], 0.025699997);
        assert_relative_eq!(m[(1, 0)], -0.0051436689);
        assert_relative_eq!(m[(3, 3)], 1.0);
        assert_relative_eq!(cal.normalized_depth_scale(), 0.0001249866 * 65535.0, epsilon = 1e-4);
    }

    #[test]
    fn deproject_then_project() {
        let k = Intrinsics {
            offset: [320.0, 240.0],
            focal_length: [600.0, 600.0],
        };
        let p = k.deproject(Point2::new(420.0, 180.0), 2.0);
        assert_relative_eq!(p, Point3::new(1.0 / 3.0, -0.2, 2.0), epsilon = 1e-6);
        let back = k.project(&p).unwrap();
        assert_relative_eq!(back, Point2::new(420.0, 180.0), epsilon = 1e-3);
        assert!(k.project(&Point3::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn high_rate_depth_is_renegotiated() {
        let mut requests = Vec::new();
        let negotiation = CaptureNegotiation::negotiate(|req| {
            requests.push(*req);
            Ok::<_, ()>(match requests.len() {
                1 => StreamSettings {
                    width: 628,
                    height: 471,
                    frame_rate: 110.0,
                },
                2 => StreamSettings {
                    width: 628,
                    height: 469,
                    frame_rate: 30.0,
                },
                _ => StreamSettings {
                    width: 640,
                    height: 480,
                    frame_rate: 30.0,
                },
            })
        })
        .unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1], CaptureNegotiation::DEPTH_FALLBACK);
        assert_eq!((negotiation.depth.width, negotiation.depth.height), (628, 469));
        assert_eq!(negotiation.color.size(), FrameSize::new(640, 480));

        let cal = BuiltinCalibrations.calibration("ZR300").unwrap();
        assert!(negotiation.depth_intrinsics(&cal).is_ok());
    }

    #[test]
    fn low_rate_depth_is_kept() {
        let mut calls = 0;
        let negotiation = CaptureNegotiation::negotiate(|_| {
            calls += 1;
            Ok::<_, ()>(StreamSettings {
                width: 640,
                height: 480,
                frame_rate: 60.0,
            })
        })
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(negotiation.depth.frame_rate, 60.0);
    }

    #[test]
    fn calibration_survives_json() {
        let cal = BuiltinCalibrations.calibration("ZR300").unwrap();
        let json = serde_json::to_string(&cal).unwrap();
        let back: CameraCalibration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cal);
    }
}
