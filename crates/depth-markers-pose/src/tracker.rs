//! Stage 10: camera movement relative to a reference marker.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::pose::MarkerPose;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Code of the marker that anchors the world frame.
    pub reference_id: u8,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self { reference_id: 1 }
    }
}

/// Per-frame tracker output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CameraMovement {
    /// Movement since the first sighting of the reference marker.
    Available(Matrix4<f32>),
    /// The reference marker is not visible in this frame.
    Unavailable,
}

impl CameraMovement {
    pub fn matrix(&self) -> Option<&Matrix4<f32>> {
        match self {
            CameraMovement::Available(m) => Some(m),
            CameraMovement::Unavailable => None,
        }
    }
}

/// Tracks the camera against the first observed pose of one marker.
#[derive(Clone, Debug, Default)]
pub struct CameraTracker {
    params: TrackerParams,
    /// `world_from_camera` at the first sighting.
    initial: Option<Matrix4<f32>>,
}

impl CameraTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            initial: None,
        }
    }

    pub fn reference_id(&self) -> u8 {
        self.params.reference_id
    }

    pub fn has_reference(&self) -> bool {
        self.initial.is_some()
    }

    /// Forget the reference; the next sighting starts over at identity.
    pub fn reset(&mut self) {
        self.initial = None;
    }

    /// Movement for one frame's poses.
    ///
    /// The current marker pose is composed with the inverse of the first
    /// one, so a marker that moved by `t` in camera space yields a
    /// translation of `t`. The reference pose is never refreshed.
    pub fn update<'a>(&mut self, poses: impl IntoIterator<Item = &'a MarkerPose>) -> CameraMovement {
        let id = self.params.reference_id;
        let Some(pose) = poses.into_iter().find(|p| p.id == id) else {
            log::trace!("reference marker {id} not visible");
            return CameraMovement::Unavailable;
        };
        match self.initial {
            None => {
                log::info!("reference marker {id} anchored at {:?}", pose.translation);
                self.initial = Some(pose.world_from_camera());
                CameraMovement::Available(Matrix4::identity())
            }
            Some(initial) => CameraMovement::Available(pose.camera_from_marker() * initial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Rotation3, Vector3};

    fn pose(id: u8, rotation: Matrix3<f32>, t: [f32; 3]) -> MarkerPose {
        MarkerPose {
            id,
            rotation,
            translation: Vector3::from(t),
        }
    }

    #[test]
    fn first_sighting_is_identity_then_translation() {
        let mut tracker = CameraTracker::new(TrackerParams::default());
        let r = Matrix3::identity();
        let first = tracker.update(&[pose(1, r, [0.0, 0.0, 1.0])]);
        assert_eq!(first, CameraMovement::Available(Matrix4::identity()));

        for _ in 1..10 {
            tracker.update(&[pose(1, r, [0.05, 0.0, 1.0])]);
        }
        let later = tracker.update(&[pose(1, r, [0.1, 0.0, 1.0])]);
        let m = later.matrix().copied().unwrap();
        assert_relative_eq!(m.fixed_view::<3, 1>(0, 3).into_owned(), Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(m.fixed_view::<3, 3>(0, 0).into_owned(), Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn absent_reference_is_unavailable() {
        let mut tracker = CameraTracker::default();
        tracker.params.reference_id = 1;
        assert_eq!(tracker.update(&[]), CameraMovement::Unavailable);
        assert_eq!(
            tracker.update(&[pose(7, Matrix3::identity(), [0.0, 0.0, 1.0])]),
            CameraMovement::Unavailable
        );
        assert!(!tracker.has_reference());
    }

    #[test]
    fn rotation_composes_with_the_initial_pose() {
        let mut tracker = CameraTracker::new(TrackerParams { reference_id: 3 });
        let r0 = *Rotation3::from_euler_angles(0.1, -0.2, 0.3).matrix();
        let p0 = pose(3, r0, [0.2, -0.1, 1.5]);
        tracker.update(&[p0]);

        let dr = *Rotation3::from_euler_angles(0.0, 0.05, 0.0).matrix();
        let p1 = pose(3, dr * r0, [0.25, -0.1, 1.4]);
        let m = tracker.update(&[p1]).matrix().copied().unwrap();
        // Movement maps the initial marker pose onto the current one.
        assert_relative_eq!(m * p0.camera_from_marker(), p1.camera_from_marker(), epsilon = 1e-5);
    }

    #[test]
    fn reset_restarts_at_identity() {
        let mut tracker = CameraTracker::new(TrackerParams::default());
        tracker.update(&[pose(1, Matrix3::identity(), [0.0, 0.0, 1.0])]);
        tracker.reset();
        let again = tracker.update(&[pose(1, Matrix3::identity(), [0.3, 0.0, 1.0])]);
        assert_eq!(again, CameraMovement::Available(Matrix4::identity()));
    }
}
