//! Stage 8: scatter depth samples into color-aligned camera space.

use depth_markers_core::{DepthImageView, FrameSize, Texture};
use nalgebra::{Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::calibration::{CameraCalibration, CaptureNegotiation, Intrinsics};
use crate::error::CalibrationError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftParams {
    /// Points at or closer than this depth (metres, color camera space)
    /// are dropped before projection.
    pub min_depth: f32,
    /// Points beyond this depth are dropped.
    pub max_depth: f32,
}

impl Default for LiftParams {
    fn default() -> Self {
        Self {
            min_depth: 0.0,
            max_depth: 10.0,
        }
    }
}

/// Depth-to-color lifting for one negotiated stream pair.
#[derive(Clone, Debug)]
pub struct DepthLifter {
    depth: Intrinsics,
    color: Intrinsics,
    depth_scale: f32,
    depth_to_color: Matrix4<f32>,
    color_size: FrameSize,
    params: LiftParams,
}

impl DepthLifter {
    pub fn new(
        calibration: &CameraCalibration,
        negotiation: &CaptureNegotiation,
        params: LiftParams,
    ) -> Result<Self, CalibrationError> {
        Ok(Self {
            depth: negotiation.depth_intrinsics(calibration)?,
            color: calibration.color,
            depth_scale: calibration.depth_scale,
            depth_to_color: calibration.depth_to_color_matrix(),
            color_size: negotiation.color.size(),
            params,
        })
    }

    pub fn color_size(&self) -> FrameSize {
        self.color_size
    }

    /// Color-camera position of one raw depth sample, with its color pixel.
    fn lift_sample(&self, i: usize, j: usize, raw: u16) -> Option<(Point3<f32>, Point2<f32>)> {
        if raw == 0 {
            return None;
        }
        let z = raw as f32 * self.depth_scale;
        let p = self.depth.deproject(Point2::new(i as f32, j as f32), z);
        let q = self.depth_to_color.transform_point(&p);
        if q.z <= self.params.min_depth || q.z > self.params.max_depth {
            return None;
        }
        Some((q, self.color.project(&q)?))
    }

    /// Scatter every depth pixel to its color pixel; the nearest sample
    /// wins where several land on the same pixel.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = depth.width, height = depth.height))
    )]
    pub fn lift(&self, depth: &DepthImageView<'_>) -> Texture<Option<Point3<f32>>> {
        let FrameSize { width, height } = self.color_size;
        let mut out: Texture<Option<Point3<f32>>> = Texture::filled(width, height, None);
        let mut written = 0usize;
        for j in 0..depth.height {
            for i in 0..depth.width {
                let Some((q, px)) = self.lift_sample(i, j, depth.get(i, j)) else {
                    continue;
                };
                let (x, y) = (px.x.round(), px.y.round());
                if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
                    continue;
                }
                let (x, y) = (x as usize, y as usize);
                match out.get(x, y) {
                    Some(Some(prev)) if prev.z <= q.z => {}
                    _ => {
                        out.set(x, y, Some(q));
                        written += 1;
                    }
                }
            }
        }
        log::debug!("lifted {written} depth samples into {width}x{height}");
        out
    }
}
