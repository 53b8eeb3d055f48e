//! Stage 9: marker frames from lifted corner positions.
//!
//! Each decoded marker gets a right-handed frame: `x` along the marker's
//! top edge, `y` along its left edge (both in image orientation), `z` the
//! cross product, and the quad centroid as origin.

use depth_markers_core::{Texel, Texture, ZERO_TEXEL};
use depth_markers_detect::MarkerRecord;
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Texels per marker in the packed pose texture.
pub const POSE_TEXELS: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Corner samples farther than this (squared metres) from the first
    /// sample are ignored.
    pub max_sample_dist2: f32,
    /// Upper bound on `|cos|` between the diagonal-derived `x` and `y`
    /// axes.
    pub max_axis_cos: f32,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            max_sample_dist2: 4e-4,
            max_axis_cos: 0.06,
        }
    }
}

/// Rigid marker-to-camera transform of one decoded marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    /// Decoded marker code.
    pub id: u8,
    /// Columns are the marker axes in camera space.
    pub rotation: Matrix3<f32>,
    /// Marker center in camera space (metres).
    pub translation: Vector3<f32>,
}

impl MarkerPose {
    pub fn camera_from_marker(&self) -> Matrix4<f32> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Inverse of [`Self::camera_from_marker`], taking the marker as the
    /// world frame.
    pub fn world_from_camera(&self) -> Matrix4<f32> {
        let rt = self.rotation.transpose();
        let mut m = rt.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-(rt * self.translation)));
        m
    }

    /// Three texels `(axis_k, t_k)`. Texel 2 also carries `4 * (id + 1)`
    /// on top of `z.z`, which stays within `[-1, 1]`.
    pub fn encode(&self) -> [Texel; POSE_TEXELS] {
        let r = &self.rotation;
        let t = &self.translation;
        let id_mark = 4.0 * (self.id as f32 + 1.0);
        [
            [r[(0, 0)], r[(1, 0)], r[(2, 0)], t.x],
            [r[(0, 1)], r[(1, 1)], r[(2, 1)], t.y],
            [r[(0, 2)], r[(1, 2)], r[(2, 2)] + id_mark, t.z],
        ]
    }

    /// `None` for the all-zero triple.
    pub fn decode(texels: &[Texel; POSE_TEXELS]) -> Option<Self> {
        if texels.iter().all(|t| *t == ZERO_TEXEL) {
            return None;
        }
        let [a, b, c] = texels;
        let packed = (c[2] / 4.0).round();
        if packed < 1.0 {
            return None;
        }
        Some(Self {
            id: (packed - 1.0) as u8,
            rotation: Matrix3::new(
                a[0], b[0], c[0], //
                a[1], b[1], c[1], //
                a[2], b[2], c[2] - 4.0 * packed,
            ),
            translation: Vector3::new(a[3], b[3], c[3]),
        })
    }
}

/// Average of the lifted samples at and next to `corner`, stepping one
/// pixel towards `centroid` along x, y and the diagonal.
fn corner_position(
    lifted: &Texture<Option<Point3<f32>>>,
    corner: Point2<i32>,
    centroid: Point2<f32>,
    params: &PoseParams,
) -> Option<Point3<f32>> {
    let sx = if centroid.x >= corner.x as f32 { 1 } else { -1 };
    let sy = if centroid.y >= corner.y as f32 { 1 } else { -1 };
    let samples = [(0, 0), (sx, 0), (0, sy), (sx, sy)].map(|(dx, dy)| {
        let (x, y) = (corner.x + dx, corner.y + dy);
        if x < 0 || y < 0 {
            return None;
        }
        lifted.get(x as usize, y as usize).copied().flatten()
    });

    let reference = samples.iter().flatten().next()?;
    let (sum, count) = samples
        .iter()
        .flatten()
        .filter(|s| (*s - reference).norm_squared() <= params.max_sample_dist2)
        .fold((Vector3::zeros(), 0usize), |(sum, n), s| (sum + s.coords, n + 1));
    (count >= 3).then(|| Point3::from(sum / count as f32))
}

/// Fill in at most one missing corner as the fourth parallelogram vertex.
fn complete_quad(corners: [Option<Point3<f32>>; 4]) -> Option<[Point3<f32>; 4]> {
    let missing: Vec<usize> = (0..4).filter(|&k| corners[k].is_none()).collect();
    match missing.as_slice() {
        [] => Some(corners.map(|c| c.unwrap_or_else(Point3::origin))),
        [k] => {
            let at = |o: usize| corners[(k + o) % 4];
            let filled = at(3)? + (at(1)? - at(2)?);
            let mut out = corners;
            out[*k] = Some(filled);
            Some(out.map(|c| c.unwrap_or(filled)))
        }
        _ => None,
    }
}

/// Pose of one decoded marker; `None` when fewer than three corners lift
/// or the frame is too skewed.
pub fn marker_pose(
    record: &MarkerRecord,
    lifted: &Texture<Option<Point3<f32>>>,
    params: &PoseParams,
) -> Option<MarkerPose> {
    let centers = record.corner_centers();
    let centroid = Point2::from(centers.iter().map(|c| c.coords).sum::<nalgebra::Vector2<f32>>() / 4.0);
    let lifted_corners = record
        .corners
        .map(|c| corner_position(lifted, c, centroid, params));
    let q = complete_quad(lifted_corners)?;

    let d1 = q[2] - q[0];
    let d2 = q[3] - q[1];
    let x = (d1 - d2).try_normalize(f32::EPSILON)?;
    let y = (d1 + d2).try_normalize(f32::EPSILON)?;
    if x.dot(&y).abs() >= params.max_axis_cos {
        return None;
    }
    let z = x.cross(&y).try_normalize(f32::EPSILON)?;
    let y = z.cross(&x);

    let center = q.iter().map(|p| p.coords).sum::<Vector3<f32>>() / 4.0;
    Some(MarkerPose {
        id: record.code,
        rotation: Matrix3::from_columns(&[x, y, z]),
        translation: center,
    })
}

/// Pose for every decoded marker cell.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(cells_x = markers.width(), cells_y = markers.height()))
)]
pub fn extract_poses(
    markers: &Texture<Option<MarkerRecord>>,
    lifted: &Texture<Option<Point3<f32>>>,
    params: &PoseParams,
) -> Texture<Option<MarkerPose>> {
    let poses = markers.map(|m| m.as_ref().and_then(|r| marker_pose(r, lifted, params)));
    log::debug!(
        "{} of {} markers have a pose",
        poses.as_slice().iter().flatten().count(),
        markers.as_slice().iter().flatten().count()
    );
    poses
}

/// Pack poses three texels per cell along x.
pub fn pack_poses(poses: &Texture<Option<MarkerPose>>) -> Texture<Texel> {
    Texture::from_fn(poses.width() * POSE_TEXELS, poses.height(), |x, y| {
        poses
            .get(x / POSE_TEXELS, y)
            .copied()
            .flatten()
            .map_or(ZERO_TEXEL, |p| p.encode()[x % POSE_TEXELS])
    })
}

pub fn unpack_poses(packed: &Texture<Texel>) -> Texture<Option<MarkerPose>> {
    Texture::from_fn(packed.width() / POSE_TEXELS, packed.height(), |i, j| {
        let x = i * POSE_TEXELS;
        let texel = |k: usize| packed.get(x + k, j).copied().unwrap_or(ZERO_TEXEL);
        MarkerPose::decode(&[texel(0), texel(1), texel(2)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const F: f32 = 300.0;
    const C: [f32; 2] = [160.0, 120.0];

    /// Pinhole view of the plane `z = depth`.
    fn plane(depth: f32) -> Texture<Option<Point3<f32>>> {
        Texture::from_fn(320, 240, |x, y| {
            Some(Point3::new(
                (x as f32 - C[0]) / F * depth,
                (y as f32 - C[1]) / F * depth,
                depth,
            ))
        })
    }

    fn record() -> MarkerRecord {
        MarkerRecord {
            code: 45,
            corners: [
                Point2::new(109, 70),
                Point2::new(209, 69),
                Point2::new(209, 170),
                Point2::new(109, 169),
            ],
        }
    }

    #[test]
    fn fronto_parallel_marker_faces_the_camera() {
        let pose = marker_pose(&record(), &plane(1.0), &PoseParams::default()).unwrap();
        assert_eq!(pose.id, 45);
        assert_relative_eq!(pose.rotation, Matrix3::identity(), epsilon = 0.02);
        assert_relative_eq!(pose.translation.z, 1.0, epsilon = 1e-5);
        assert_relative_eq!(pose.translation.x, (159.5 - C[0]) / F, epsilon = 3e-3);
        let r = pose.rotation;
        assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-5);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn world_from_camera_inverts_the_pose() {
        let pose = marker_pose(&record(), &plane(1.2), &PoseParams::default()).unwrap();
        let product = pose.world_from_camera() * pose.camera_from_marker();
        assert_relative_eq!(product, Matrix4::identity(), epsilon = 1e-5);
    }

    #[test]
    fn one_missing_corner_is_completed() {
        let mut lifted = plane(1.0);
        for y in 160..175 {
            for x in 100..115 {
                lifted.set(x, y, None);
            }
        }
        let full = marker_pose(&record(), &plane(1.0), &PoseParams::default()).unwrap();
        let partial = marker_pose(&record(), &lifted, &PoseParams::default()).unwrap();
        assert_relative_eq!(partial.translation, full.translation, epsilon = 2e-3);
    }

    #[test]
    fn fewer_than_three_corners_give_no_pose() {
        let mut lifted = plane(1.0);
        for (x0, y0) in [(100, 160), (200, 160)] {
            for y in y0..y0 + 15 {
                for x in x0..x0 + 15 {
                    lifted.set(x, y, None);
                }
            }
        }
        assert!(marker_pose(&record(), &lifted, &PoseParams::default()).is_none());
    }

    #[test]
    fn corner_needs_three_consistent_samples() {
        let mut lifted = plane(1.0);
        // Corner (109, 70) samples (109, 70), (110, 70), (109, 71), (110, 71).
        lifted.set(110, 70, Some(Point3::new(0.0, 0.0, 3.0)));
        lifted.set(109, 71, Some(Point3::new(0.0, 0.0, 3.0)));
        let centroid = Point2::new(159.5, 120.0);
        let params = PoseParams::default();
        assert!(corner_position(&lifted, Point2::new(109, 70), centroid, &params).is_none());
        lifted.set(109, 71, None);
        lifted.set(110, 70, None);
        assert!(corner_position(&lifted, Point2::new(109, 70), centroid, &params).is_none());
        assert!(corner_position(&plane(1.0), Point2::new(109, 70), centroid, &params).is_some());
    }

    #[test]
    fn sheared_quad_is_rejected() {
        let mut sheared = record();
        sheared.corners[2] = Point2::new(259, 170);
        sheared.corners[3] = Point2::new(159, 169);
        assert!(marker_pose(&sheared, &plane(1.0), &PoseParams::default()).is_none());
    }

    #[test]
    fn packed_pose_keeps_id_and_frame() {
        let pose = marker_pose(&record(), &plane(1.0), &PoseParams::default()).unwrap();
        let poses = Texture::from_fn(2, 1, |i, _| (i == 1).then_some(pose));
        let packed = pack_poses(&poses);
        assert_eq!(packed.width(), 6);
        assert_eq!(packed.get(0, 0), Some(&ZERO_TEXEL));
        let back = unpack_poses(&packed);
        assert_eq!(back.get(0, 0), Some(&None));
        let decoded = back.get(1, 0).copied().flatten().unwrap();
        assert_eq!(decoded.id, 45);
        assert_relative_eq!(decoded.rotation, pose.rotation, epsilon = 1e-5);
        assert_relative_eq!(decoded.translation, pose.translation);
    }
}
