use approx::assert_relative_eq;
use depth_markers::core::{DepthImage, RgbImage};
use depth_markers::detect::{DetectError, SyntheticMarker};
use depth_markers::pose::{
    CalibrationError, CameraCalibration, CameraModel, CaptureNegotiation, DepthIntrinsicsEntry,
    Distortion, Intrinsics, StreamSettings,
};
use depth_markers::{
    CameraMovement, Frame, PipelineBuilder, PipelineConfig, PipelineError, StageId,
};
use nalgebra::{Matrix3, Matrix4};

const W: usize = 320;
const H: usize = 240;

fn stream(width: usize, height: usize) -> StreamSettings {
    StreamSettings {
        width,
        height,
        frame_rate: 30.0,
    }
}

/// Depth and color cameras sharing one pinhole model.
fn aligned_rig() -> (CameraCalibration, CaptureNegotiation) {
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
    let negotiation = CaptureNegotiation {
        depth: stream(W, H),
        color: stream(W, H),
    };
    (calibration, negotiation)
}

fn marker_frame(code: u8) -> RgbImage {
    SyntheticMarker::new(code, [110, 70], 100, 30).render(W, H)
}

fn flat_depth(raw: u16) -> DepthImage {
    DepthImage::from_fn(W, H, |_, _| raw)
}

fn tracking_pipeline() -> depth_markers::Pipeline {
    let (calibration, negotiation) = aligned_rig();
    PipelineBuilder::new(PipelineConfig::default())
        .calibration(calibration, negotiation)
        .build()
        .unwrap()
}

#[test]
fn color_only_pipeline_decodes_markers() {
    let mut pipeline = PipelineBuilder::new(PipelineConfig::default())
        .build()
        .unwrap();
    assert!(!pipeline.has_pose_stages());
    assert_eq!(
        pipeline.graph().stages().collect::<Vec<_>>(),
        StageId::DETECTION
    );

    let image = marker_frame(45);
    let out = pipeline.process(&Frame::new(image.as_view())).unwrap();
    assert_eq!(out.markers.len(), 1);
    assert_eq!(out.markers[0].code, 45);
    assert!(out.poses.is_empty());
    assert_eq!(out.movement, CameraMovement::Unavailable);
}

#[test]
fn color_only_pipeline_ignores_depth() {
    let mut pipeline = PipelineBuilder::new(PipelineConfig::default())
        .build()
        .unwrap();
    let image = marker_frame(45);
    let depth = flat_depth(1000);
    let out = pipeline
        .process(&Frame::new(image.as_view()).with_depth(depth.as_view()))
        .unwrap();
    assert_eq!(out.markers.len(), 1);
    assert!(pipeline.buffers().lifted.is_none());
}

#[test]
fn unsupported_resolution_is_an_error() {
    let mut pipeline = PipelineBuilder::new(PipelineConfig::default())
        .build()
        .unwrap();
    let image = RgbImage::from_fn(100, 120, |_, _| [255; 3]);
    assert_eq!(
        pipeline.process(&Frame::new(image.as_view())),
        Err(PipelineError::Resolution(DetectError::Resolution {
            width: 100,
            height: 120
        }))
    );
}

#[test]
fn pose_pipeline_needs_matching_frames() {
    let mut pipeline = tracking_pipeline();
    assert!(pipeline.has_pose_stages());
    let image = marker_frame(1);
    assert_eq!(
        pipeline.process(&Frame::new(image.as_view())),
        Err(PipelineError::MissingDepth)
    );

    let small = DepthImage::from_fn(160, 120, |_, _| 1000);
    assert_eq!(
        pipeline.process(&Frame::new(image.as_view()).with_depth(small.as_view())),
        Err(PipelineError::FrameSize {
            stream: "depth",
            width: 160,
            height: 120,
            expected_width: W,
            expected_height: H,
        })
    );

    let large = RgbImage::from_fn(640, 480, |_, _| [255; 3]);
    let depth = flat_depth(1000);
    assert!(matches!(
        pipeline.process(&Frame::new(large.as_view()).with_depth(depth.as_view())),
        Err(PipelineError::FrameSize {
            stream: "color",
            ..
        })
    ));
}

#[test]
fn missing_depth_intrinsics_fail_the_build() {
    let (calibration, mut negotiation) = aligned_rig();
    negotiation.depth = stream(628, 469);
    let err = PipelineBuilder::new(PipelineConfig::default())
        .calibration(calibration, negotiation)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::Calibration(CalibrationError::DepthIntrinsicsUnavailable {
            width: 628,
            height: 469
        })
    );
}

#[test]
fn camera_movement_follows_the_reference_marker() {
    let mut pipeline = tracking_pipeline();
    let image = marker_frame(1);

    let near = flat_depth(1000);
    let first = pipeline
        .process(&Frame::new(image.as_view()).with_depth(near.as_view()))
        .unwrap();
    assert_eq!(first.poses.len(), 1);
    assert_eq!(first.poses[0].id, 1);
    assert_relative_eq!(first.poses[0].rotation, Matrix3::identity(), epsilon = 0.02);
    assert_eq!(first.movement, CameraMovement::Available(Matrix4::identity()));

    let far = flat_depth(1100);
    let second = pipeline
        .process(&Frame::new(image.as_view()).with_depth(far.as_view()))
        .unwrap();
    let m = second.movement.matrix().copied().unwrap();
    assert_relative_eq!(m[(2, 3)], 0.1, epsilon = 1e-3);

    pipeline.reset_tracking();
    let again = pipeline
        .process(&Frame::new(image.as_view()).with_depth(far.as_view()))
        .unwrap();
    assert_eq!(again.movement, CameraMovement::Available(Matrix4::identity()));
}

#[test]
fn other_markers_do_not_anchor_tracking() {
    let mut pipeline = tracking_pipeline();
    let image = marker_frame(45);
    let depth = flat_depth(1000);
    let out = pipeline
        .process(&Frame::new(image.as_view()).with_depth(depth.as_view()))
        .unwrap();
    assert_eq!(out.poses.len(), 1);
    assert_eq!(out.poses[0].id, 45);
    assert_eq!(out.movement, CameraMovement::Unavailable);
}

#[test]
fn every_texture_is_exported() {
    let mut pipeline = tracking_pipeline();
    assert!(pipeline.encode_buffers().is_empty());

    let image = marker_frame(1);
    let depth = flat_depth(1000);
    pipeline
        .process(&Frame::new(image.as_view()).with_depth(depth.as_view()))
        .unwrap();
    let dumps = pipeline.encode_buffers();
    let names: Vec<_> = dumps.iter().map(|(n, _)| *n).collect();
    assert_eq!(
        names,
        [
            "threshold", "edges", "corners", "refined", "compact", "links", "markers", "lifted",
            "poses"
        ]
    );
    let size = |name: &str| {
        let (_, t) = dumps.iter().find(|(n, _)| *n == name).unwrap();
        (t.width(), t.height())
    };
    assert_eq!(size("threshold"), (W, H));
    assert_eq!(size("compact"), (W / 5, H / 5));
    assert_eq!(size("markers"), (W / 40, H / 30));
    assert_eq!(size("lifted"), (W, H));
    assert_eq!(size("poses"), (3 * W / 40, H / 30));
}

#[test]
fn config_reaches_the_tracker() {
    let (calibration, negotiation) = aligned_rig();
    let mut config = PipelineConfig::default();
    config.tracker.reference_id = 45;
    let mut pipeline = PipelineBuilder::new(config)
        .calibration(calibration, negotiation)
        .build()
        .unwrap();
    let image = marker_frame(45);
    let depth = flat_depth(1000);
    let out = pipeline
        .process(&Frame::new(image.as_view()).with_depth(depth.as_view()))
        .unwrap();
    assert_eq!(out.movement, CameraMovement::Available(Matrix4::identity()));
}
