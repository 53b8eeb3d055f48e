//! Per-frame execution of the stage graph.

use depth_markers_core::{DepthImageView, FrameSize, RgbImageView, Texel, Texture};
use depth_markers_detect::{
    check_frame_size, classify_edges, compact_corners, decode_markers, detect_corners,
    refine_corners, resolve_links, threshold, CompactCorner, CornerTexel, EdgeDirectionTable,
    EdgeLink, EdgeTexel, MarkerRecord, Shade,
};
use depth_markers_pose::{
    extract_poses, pack_poses, CameraCalibration, CameraMovement, CameraTracker,
    CaptureNegotiation, DepthLifter, MarkerPose,
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::graph::{BufferId, StageGraph, StageId};

/// One color frame, optionally with its depth frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub color: RgbImageView<'a>,
    pub depth: Option<DepthImageView<'a>>,
}

impl<'a> Frame<'a> {
    pub fn new(color: RgbImageView<'a>) -> Self {
        Self { color, depth: None }
    }

    pub fn with_depth(mut self, depth: DepthImageView<'a>) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Buffers written while processing one frame. Every slot starts empty and
/// is filled by the stage that owns it.
#[derive(Clone, Debug, Default)]
pub struct FrameBuffers {
    pub frame: Option<FrameSize>,
    pub shades: Option<Texture<Shade>>,
    pub edges: Option<Texture<EdgeTexel>>,
    pub corners: Option<Texture<CornerTexel>>,
    pub refined: Option<Texture<CornerTexel>>,
    pub compact: Option<Texture<Option<CompactCorner>>>,
    pub links: Option<Texture<Option<EdgeLink>>>,
    pub markers: Option<Texture<Option<MarkerRecord>>>,
    pub lifted: Option<Texture<Option<Point3<f32>>>>,
    pub poses: Option<Texture<Option<MarkerPose>>>,
    pub movement: Option<CameraMovement>,
}

/// What one frame produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    /// Decoded markers in row-major cell order.
    pub markers: Vec<MarkerRecord>,
    pub poses: Vec<MarkerPose>,
    pub movement: CameraMovement,
}

fn ready<T>(slot: &Option<T>, stage: StageId, buffer: BufferId) -> Result<&T, PipelineError> {
    slot.as_ref().ok_or(PipelineError::Unproduced { stage, buffer })
}

#[derive(Clone, Debug)]
struct PoseStages {
    lifter: DepthLifter,
    depth_size: FrameSize,
}

/// Assembles a [`Pipeline`] once; the stage list is fixed by [`build`](Self::build).
#[derive(Clone, Debug)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    calibration: Option<(CameraCalibration, CaptureNegotiation)>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            calibration: None,
        }
    }

    /// Enable stages 8-10 for a calibrated depth camera.
    pub fn calibration(
        mut self,
        calibration: CameraCalibration,
        negotiation: CaptureNegotiation,
    ) -> Self {
        self.calibration = Some((calibration, negotiation));
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let (graph, pose) = match &self.calibration {
            None => (StageGraph::detection()?, None),
            Some((calibration, negotiation)) => {
                let color = negotiation.color.size();
                check_frame_size(color.width, color.height)?;
                let lifter = DepthLifter::new(calibration, negotiation, self.config.lift.clone())?;
                let stages = PoseStages {
                    lifter,
                    depth_size: negotiation.depth.size(),
                };
                (StageGraph::with_pose()?, Some(stages))
            }
        };
        log::debug!(
            "pipeline stages: {:?}",
            graph.stages().collect::<Vec<_>>()
        );
        Ok(Pipeline {
            tracker: CameraTracker::new(self.config.tracker.clone()),
            config: self.config,
            graph,
            table: EdgeDirectionTable::shared(),
            pose,
            buffers: FrameBuffers::default(),
        })
    }
}

/// Immutable stage graph plus the state that persists between frames: the
/// camera tracker and the buffers of the last processed frame.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    graph: StageGraph,
    table: &'static EdgeDirectionTable,
    pose: Option<PoseStages>,
    tracker: CameraTracker,
    buffers: FrameBuffers,
}

impl Pipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Whether stages 8-10 run.
    pub fn has_pose_stages(&self) -> bool {
        self.pose.is_some()
    }

    /// Buffers of the last processed frame.
    pub fn buffers(&self) -> &FrameBuffers {
        &self.buffers
    }

    /// Forget the tracker's reference pose.
    pub fn reset_tracking(&mut self) {
        self.tracker.reset();
    }

    fn check_frame(&self, frame: &Frame<'_>) -> Result<(), PipelineError> {
        let Frame { color, depth } = frame;
        check_frame_size(color.width, color.height)?;
        let Some(pose) = &self.pose else {
            return Ok(());
        };
        let expect = |stream, width, height, expected: FrameSize| {
            if (width, height) == (expected.width, expected.height) {
                Ok(())
            } else {
                Err(PipelineError::FrameSize {
                    stream,
                    width,
                    height,
                    expected_width: expected.width,
                    expected_height: expected.height,
                })
            }
        };
        expect("color", color.width, color.height, pose.lifter.color_size())?;
        let depth = depth.as_ref().ok_or(PipelineError::MissingDepth)?;
        expect("depth", depth.width, depth.height, pose.depth_size)
    }

    /// Run every stage on one frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = frame.color.width, height = frame.color.height))
    )]
    pub fn process(&mut self, frame: &Frame<'_>) -> Result<FrameOutput, PipelineError> {
        self.check_frame(frame)?;
        let mut buffers = FrameBuffers {
            frame: Some(FrameSize::new(frame.color.width, frame.color.height)),
            ..FrameBuffers::default()
        };
        let schedule: Vec<StageId> = self.graph.stages().collect();
        for stage in schedule {
            self.run_stage(stage, frame, &mut buffers)?;
        }

        let output = FrameOutput {
            markers: buffers
                .markers
                .iter()
                .flat_map(|m| m.as_slice().iter().flatten().copied())
                .collect(),
            poses: buffers
                .poses
                .iter()
                .flat_map(|p| p.as_slice().iter().flatten().copied())
                .collect(),
            movement: buffers.movement.unwrap_or(CameraMovement::Unavailable),
        };
        log::debug!(
            "frame done: {} markers, {} poses, camera movement {}",
            output.markers.len(),
            output.poses.len(),
            if output.movement.matrix().is_some() {
                "available"
            } else {
                "unavailable"
            }
        );
        self.buffers = buffers;
        Ok(output)
    }

    fn run_stage(
        &mut self,
        stage: StageId,
        frame: &Frame<'_>,
        b: &mut FrameBuffers,
    ) -> Result<(), PipelineError> {
        use BufferId as B;
        let p = &self.config.detect;
        match stage {
            StageId::Threshold => b.shades = Some(threshold(&frame.color, &p.threshold)),
            StageId::Edges => {
                let shades = ready(&b.shades, stage, B::Shades)?;
                b.edges = Some(classify_edges(shades, self.table));
            }
            StageId::Corners => {
                let edges = ready(&b.edges, stage, B::Edges)?;
                b.corners = Some(detect_corners(edges, &p.corners));
            }
            StageId::Refine => {
                let corners = ready(&b.corners, stage, B::Corners)?;
                b.refined = Some(refine_corners(corners));
            }
            StageId::Compact => {
                let refined = ready(&b.refined, stage, B::Refined)?;
                b.compact = Some(compact_corners(refined));
            }
            StageId::Links => {
                let compact = ready(&b.compact, stage, B::Compact)?;
                let corners = ready(&b.corners, stage, B::Corners)?;
                b.links = Some(resolve_links(compact, corners, &p.links));
            }
            StageId::Decode => {
                let links = ready(&b.links, stage, B::Links)?;
                let corners = ready(&b.corners, stage, B::Corners)?;
                b.markers = Some(decode_markers(links, corners, &p.decoder));
            }
            StageId::Lift => {
                let pose = self.pose.as_ref().ok_or(PipelineError::MissingDepth)?;
                let depth = frame.depth.as_ref().ok_or(PipelineError::MissingDepth)?;
                b.lifted = Some(pose.lifter.lift(depth));
            }
            StageId::Pose => {
                let markers = ready(&b.markers, stage, B::Markers)?;
                let lifted = ready(&b.lifted, stage, B::Lifted)?;
                b.poses = Some(extract_poses(markers, lifted, &self.config.pose));
            }
            StageId::Track => {
                let poses = ready(&b.poses, stage, B::Poses)?;
                b.movement = Some(self.tracker.update(poses.as_slice().iter().flatten()));
            }
        }
        Ok(())
    }

    /// Every texture of the last frame packed as float texels, in execution
    /// order. Poses take three texels per marker cell.
    pub fn encode_buffers(&self) -> Vec<(&'static str, Texture<Texel>)> {
        let b = &self.buffers;
        let Some(frame) = b.frame else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for node in self.graph.nodes() {
            let texels = match node.output {
                BufferId::Shades => b.shades.as_ref().map(|t| t.encode(frame)),
                BufferId::Edges => b.edges.as_ref().map(|t| t.encode(frame)),
                BufferId::Corners => b.corners.as_ref().map(|t| t.encode(frame)),
                BufferId::Refined => b.refined.as_ref().map(|t| t.encode(frame)),
                BufferId::Compact => b.compact.as_ref().map(|t| t.encode(frame)),
                BufferId::Links => b.links.as_ref().map(|t| t.encode(frame)),
                BufferId::Markers => b.markers.as_ref().map(|t| t.encode(frame)),
                BufferId::Lifted => b.lifted.as_ref().map(|t| t.encode(frame)),
                BufferId::Poses => b.poses.as_ref().map(pack_poses),
                BufferId::Color | BufferId::Depth | BufferId::Movement => None,
            };
            if let Some(texels) = texels {
                out.push((node.output.name(), texels));
            }
        }
        out
    }
}
