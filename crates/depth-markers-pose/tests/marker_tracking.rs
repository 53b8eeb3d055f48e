use approx::assert_relative_eq;
use depth_markers_core::{DepthImage, Texture};
use depth_markers_detect::{MarkerDetector, MarkerRecord, SyntheticMarker};
use depth_markers_pose::{
    extract_poses, CameraCalibration, CameraModel, CameraMovement, CameraTracker,
    CaptureNegotiation, DepthIntrinsicsEntry, DepthLifter, Distortion, Intrinsics, LiftParams,
    PoseParams, StreamSettings, TrackerParams,
};
use nalgebra::{Matrix3, Vector3};

const W: usize = 320;
const H: usize = 240;

/// Depth and color cameras sharing one pinhole model.
fn aligned_rig() -> DepthLifter {
    let k = Intrinsics {
        offset: [160.0, 120.0],
        focal_length: [300.0, 300.0],
    };
    let mut identity = [0.0; 16];
    for d in 0..4 {
        identity[5 * d] = 1.0;
    }
    let calibration = CameraCalibration {
        model: CameraModel::Sr300,
        depth_scale: 0.001,
        depth_intrinsics: vec![DepthIntrinsicsEntry {
            width: W,
            height: H,
            intrinsics: k,
        }],
        color: k,
        depth_to_color: identity,
        depth_distortion: Distortion::NONE,
        color_distortion: Distortion::NONE,
    };
    let stream = StreamSettings {
        width: W,
        height: H,
        frame_rate: 30.0,
    };
    let negotiation = CaptureNegotiation {
        depth: stream,
        color: stream,
    };
    DepthLifter::new(&calibration, &negotiation, LiftParams::default()).expect("intrinsics exist")
}

fn markers(code: u8) -> Texture<Option<MarkerRecord>> {
    let image = SyntheticMarker::new(code, [110, 70], 100, 30).render(W, H);
    MarkerDetector::default()
        .detect(&image.as_view())
        .expect("valid frame size")
        .markers
}

fn flat_depth(raw: u16) -> DepthImage {
    DepthImage::from_fn(W, H, |_, _| raw)
}

#[test]
fn marker_on_a_wall_gets_a_frontal_pose() {
    let lifter = aligned_rig();
    let lifted = lifter.lift(&flat_depth(1000).as_view());
    let poses = extract_poses(&markers(45), &lifted, &PoseParams::default());
    let found: Vec<_> = poses.as_slice().iter().flatten().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 45);
    assert_relative_eq!(found[0].rotation, Matrix3::identity(), epsilon = 0.02);
    assert_relative_eq!(found[0].translation.z, 1.0, epsilon = 1e-4);
}

#[test]
fn camera_backing_away_is_tracked() {
    let lifter = aligned_rig();
    let records = markers(1);
    let mut tracker = CameraTracker::new(TrackerParams::default());

    let near = extract_poses(&records, &lifter.lift(&flat_depth(1000).as_view()), &PoseParams::default());
    let first = tracker.update(near.as_slice().iter().flatten());
    assert_eq!(first, CameraMovement::Available(nalgebra::Matrix4::identity()));

    let far = extract_poses(&records, &lifter.lift(&flat_depth(1100).as_view()), &PoseParams::default());
    let m = *tracker
        .update(far.as_slice().iter().flatten())
        .matrix()
        .expect("reference visible");
    let t: Vector3<f32> = m.fixed_view::<3, 1>(0, 3).into_owned();
    assert_relative_eq!(t.z, 0.1, epsilon = 1e-3);
    assert!(t.xy().norm() < 2e-3, "{t:?}");
}

#[test]
fn no_depth_means_no_pose() {
    let lifter = aligned_rig();
    let lifted = lifter.lift(&flat_depth(0).as_view());
    let poses = extract_poses(&markers(1), &lifted, &PoseParams::default());
    assert!(poses.as_slice().iter().all(Option::is_none));

    let mut tracker = CameraTracker::new(TrackerParams::default());
    assert_eq!(
        tracker.update(poses.as_slice().iter().flatten()),
        CameraMovement::Unavailable
    );
}
