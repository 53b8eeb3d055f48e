//! Factory calibration of the supported camera families.

#![allow(clippy::excessive_precision, clippy::unreadable_literal)]

use crate::calibration::{
    CameraCalibration, CameraModel, DepthIntrinsicsEntry, Distortion, DistortionModel, Intrinsics,
};

fn depth_entry(width: usize, height: usize, offset: [f32; 2], focal: f32) -> DepthIntrinsicsEntry {
    DepthIntrinsicsEntry {
        width,
        height,
        intrinsics: Intrinsics {
            offset,
            focal_length: [focal, focal],
        },
    }
}

pub(crate) fn calibration(model: CameraModel) -> CameraCalibration {
    match model {
        CameraModel::R200 => CameraCalibration {
            model,
            depth_scale: 0.001,
            depth_intrinsics: vec![
                depth_entry(628, 469, [305.558075, 233.5], 582.154968),
                depth_entry(
                    628,
                    361,
                    [233.3975067138671875, 179.2618865966796875],
                    447.320953369140625,
                ),
            ],
            color: Intrinsics {
                offset: [311.841033935546875, 229.7513275146484375],
                focal_length: [627.9630126953125, 634.02410888671875],
            },
            depth_to_color: [
                0.99998325109481811523, 0.002231199527159333229, 0.00533978315070271492, 0.0,
                -0.0021383403800427913666, 0.99984747171401977539, -0.017333013936877250671, 0.0,
                -0.0053776423446834087372, 0.017321307212114334106, 0.99983555078506469727, 0.0,
                -0.058898702263832092285, -0.00020283895719330757856, -0.0001998419174924492836, 1.0,
            ],
            depth_distortion: Distortion::NONE,
            color_distortion: Distortion {
                model: DistortionModel::ModifiedBrownConrady,
                coeffs: [
                    -0.078357703983783721924,
                    0.041351985186338424683,
                    -0.00025565386749804019928,
                    0.0012357287341728806496,
                    0.0,
                ],
            },
        },
        CameraModel::Sr300 => CameraCalibration {
            model,
            depth_scale: 0.0001249866472790017724,
            depth_intrinsics: vec![depth_entry(
                640,
                480,
                [310.743988037109375, 245.1811676025390625],
                475.900726318359375,
            )],
            color: Intrinsics {
                offset: [312.073974609375, 241.969329833984375],
                focal_length: [617.65087890625, 617.65093994140625],
            },
            depth_to_color: [
                0.99998641014099121094, -0.0051436689682304859161, 0.00084982655243948101997, 0.0,
                0.0051483912393450737, 0.99997079372406005859, -0.005651625804603099823, 0.0,
                -0.00082073162775486707687, 0.0056559243239462375641, 0.99998366832733154297, 0.0,
                0.025699997320771217346, -0.00073326355777680873871, 0.0039400043897330760956, 1.0,
            ],
            depth_distortion: Distortion {
                model: DistortionModel::InverseBrownConrady,
                coeffs: [
                    0.14655706286430358887,
                    0.078352205455303192139,
                    0.0026113723870366811752,
                    0.0029218809213489294052,
                    0.066788062453269958496,
                ],
            },
            color_distortion: Distortion::NONE,
        },
        CameraModel::Zr300 => CameraCalibration {
            model,
            depth_scale: 0.00100000005,
            depth_intrinsics: vec![
                depth_entry(628, 469, [309.912567, 234.410904], 575.729980),
                depth_entry(628, 361, [238.683838, 180.205521], 445.920288),
            ],
            color: Intrinsics {
                offset: [312.271545, 233.118652],
                focal_length: [616.316895, 617.343323],
            },
            depth_to_color: [
                0.999995947, 0.00140406948, 0.00246621366, 0.0,
                -0.00140700850, 0.999998271, 0.00119038881, 0.0,
                -0.00246453821, -0.00119385391, 0.999996245, 0.0,
                -0.0587307774, 7.03283295e-05, 0.000553227146, 1.0,
            ],
            depth_distortion: Distortion::NONE,
            color_distortion: Distortion {
                model: DistortionModel::ModifiedBrownConrady,
                coeffs: [0.0727398321, -0.138192296, 0.000800351670, 0.000444319186, 0.0],
            },
        },
        CameraModel::Generic4 => CameraCalibration {
            model,
            depth_scale: 0.00100000005,
            depth_intrinsics: vec![depth_entry(
                640,
                480,
                [321.17535400390625, 248.4362640380859375],
                402.60308837890625,
            )],
            color: Intrinsics {
                offset: [331.870422363281, 242.991546630859],
                focal_length: [629.172912597656, 628.130920410156],
            },
            depth_to_color: [
                0.999902248382, 0.010088876821, 0.009682051837, 0.0,
                -0.010075648315, 0.9999482631683, -0.001414125669, 0.0,
                0.009695817716, 0.001316434470, 0.99995213747, 0.0,
                0.036090422422, 0.000611198542174, -0.00184865354, 1.0,
            ],
            depth_distortion: Distortion::NONE,
            color_distortion: Distortion::NONE,
        },
    }
}
