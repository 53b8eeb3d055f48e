use criterion::{black_box, criterion_group, criterion_main, Criterion};
use depth_markers::core::{DepthImage, RgbImage};
use depth_markers::detect::{MarkerDetector, SyntheticMarker};
use depth_markers::pose::{
    CameraCalibration, CameraModel, CaptureNegotiation, DepthIntrinsicsEntry, Distortion,
    Intrinsics, StreamSettings,
};
use depth_markers::{Frame, PipelineBuilder, PipelineConfig};

const W: usize = 640;
const H: usize = 480;

fn scene() -> RgbImage {
    let mut image = RgbImage::from_fn(W, H, |_, _| [255, 255, 255]);
    for (k, origin) in [[110, 70], [430, 70], [110, 310], [430, 310]].into_iter().enumerate() {
        SyntheticMarker::new(k as u8 + 1, origin, 100, 30).draw(&mut image);
    }
    image
}

fn aligned_calibration() -> (CameraCalibration, CaptureNegotiation) {
    let k = Intrinsics {
        offset: [W as f32 / 2.0, H as f32 / 2.0],
        focal_length: [600.0, 600.0],
    };
    let mut identity = [0.0; 16];
    for d in 0..4 {
        identity[5 * d] = 1.0;
    }
    let calibration = CameraCalibration {
        model: CameraModel::Generic4,
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
    (
        calibration,
        CaptureNegotiation {
            depth: stream,
            color: stream,
        },
    )
}

fn bench_detect(c: &mut Criterion) {
    let image = scene();
    let detector = MarkerDetector::default();

    c.bench_function("detect_640x480", |b| {
        b.iter(|| {
            let detection = detector
                .detect(black_box(&image.as_view()))
                .expect("640x480 is a valid frame");
            black_box(detection.markers().count())
        })
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let image = scene();
    let depth = DepthImage::from_fn(W, H, |_, _| 1000);
    let (calibration, negotiation) = aligned_calibration();
    let mut pipeline = PipelineBuilder::new(PipelineConfig::default())
        .calibration(calibration, negotiation)
        .build()
        .expect("aligned calibration covers the frame");

    c.bench_function("pipeline_640x480_with_depth", |b| {
        b.iter(|| {
            let frame = Frame::new(image.as_view()).with_depth(depth.as_view());
            let out = pipeline
                .process(black_box(&frame))
                .expect("frame matches the calibration");
            black_box(out.poses.len())
        })
    });
}

criterion_group!(detect, bench_detect, bench_pipeline);
criterion_main!(detect);
