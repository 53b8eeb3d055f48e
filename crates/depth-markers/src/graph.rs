//! Explicit stage DAG.
//!
//! Each stage declares the buffers it reads and the single buffer it
//! writes. [`StageGraph::new`] checks the wiring once and fixes the
//! execution order; nothing about it changes afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    Threshold,
    Edges,
    Corners,
    Refine,
    Compact,
    Links,
    Decode,
    Lift,
    Pose,
    Track,
}

impl StageId {
    /// Stages 1-7, color only.
    pub const DETECTION: [StageId; 7] = [
        StageId::Threshold,
        StageId::Edges,
        StageId::Corners,
        StageId::Refine,
        StageId::Compact,
        StageId::Links,
        StageId::Decode,
    ];

    /// Stages 8-10, which need depth and calibration.
    pub const POSE: [StageId; 3] = [StageId::Lift, StageId::Pose, StageId::Track];

    /// Buffers the stage reads.
    pub fn inputs(self) -> &'static [BufferId] {
        use BufferId as B;
        match self {
            StageId::Threshold => &[B::Color],
            StageId::Edges => &[B::Shades],
            StageId::Corners => &[B::Edges],
            StageId::Refine => &[B::Corners],
            StageId::Compact => &[B::Refined],
            StageId::Links => &[B::Compact, B::Corners],
            StageId::Decode => &[B::Links, B::Corners],
            StageId::Lift => &[B::Depth],
            StageId::Pose => &[B::Markers, B::Lifted],
            StageId::Track => &[B::Poses],
        }
    }

    /// Buffer the stage writes.
    pub fn output(self) -> BufferId {
        match self {
            StageId::Threshold => BufferId::Shades,
            StageId::Edges => BufferId::Edges,
            StageId::Corners => BufferId::Corners,
            StageId::Refine => BufferId::Refined,
            StageId::Compact => BufferId::Compact,
            StageId::Links => BufferId::Links,
            StageId::Decode => BufferId::Markers,
            StageId::Lift => BufferId::Lifted,
            StageId::Pose => BufferId::Poses,
            StageId::Track => BufferId::Movement,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BufferId {
    /// Input color frame.
    Color,
    /// Input depth frame.
    Depth,
    Shades,
    Edges,
    Corners,
    Refined,
    Compact,
    Links,
    Markers,
    Lifted,
    Poses,
    Movement,
}

impl BufferId {
    pub fn name(self) -> &'static str {
        match self {
            BufferId::Color => "color",
            BufferId::Depth => "depth",
            BufferId::Shades => "threshold",
            BufferId::Edges => "edges",
            BufferId::Corners => "corners",
            BufferId::Refined => "refined",
            BufferId::Compact => "compact",
            BufferId::Links => "links",
            BufferId::Markers => "markers",
            BufferId::Lifted => "lifted",
            BufferId::Poses => "poses",
            BufferId::Movement => "movement",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNode {
    pub stage: StageId,
    pub inputs: Vec<BufferId>,
    pub output: BufferId,
}

impl StageNode {
    /// The stage with its usual wiring.
    pub fn standard(stage: StageId) -> Self {
        Self {
            stage,
            inputs: stage.inputs().to_vec(),
            output: stage.output(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("stages {stages:?} depend on each other in a cycle")]
    Cycle { stages: Vec<StageId> },
    #[error("buffer {buffer:?} has more than one writer")]
    MultipleWriters { buffer: BufferId },
    #[error("stage {stage:?} reads its own output")]
    SelfRead { stage: StageId },
    #[error("stage {stage:?} reads {buffer:?}, which nothing produces")]
    DanglingInput { stage: StageId, buffer: BufferId },
}

/// Validated stage list in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageGraph {
    nodes: Vec<StageNode>,
    sources: Vec<BufferId>,
}

impl StageGraph {
    /// Validate `nodes` against the externally supplied `sources` and sort
    /// them topologically. Ready stages keep their declaration order.
    pub fn new(nodes: Vec<StageNode>, sources: &[BufferId]) -> Result<Self, GraphError> {
        let mut writer: HashMap<BufferId, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if node.inputs.contains(&node.output) {
                return Err(GraphError::SelfRead { stage: node.stage });
            }
            if sources.contains(&node.output) || writer.insert(node.output, i).is_some() {
                return Err(GraphError::MultipleWriters {
                    buffer: node.output,
                });
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut pending = vec![0usize; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            let mut seen = Vec::with_capacity(node.inputs.len());
            for &buffer in &node.inputs {
                if sources.contains(&buffer) {
                    continue;
                }
                let Some(&w) = writer.get(&buffer) else {
                    return Err(GraphError::DanglingInput {
                        stage: node.stage,
                        buffer,
                    });
                };
                if !seen.contains(&w) {
                    seen.push(w);
                    dependents[w].push(i);
                    pending[i] += 1;
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..nodes.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &d in &dependents[i] {
                pending[d] -= 1;
                if pending[d] == 0 {
                    ready.push_back(d);
                }
            }
        }
        if order.len() < nodes.len() {
            let stages = (0..nodes.len())
                .filter(|i| !order.contains(i))
                .map(|i| nodes[i].stage)
                .collect();
            return Err(GraphError::Cycle { stages });
        }

        let mut slots: Vec<Option<StageNode>> = nodes.into_iter().map(Some).collect();
        let nodes = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(Self {
            nodes,
            sources: sources.to_vec(),
        })
    }

    /// Stages 1-7 fed by the color frame.
    pub fn detection() -> Result<Self, GraphError> {
        Self::new(
            StageId::DETECTION.map(StageNode::standard).to_vec(),
            &[BufferId::Color],
        )
    }

    /// All ten stages fed by color and depth frames.
    pub fn with_pose() -> Result<Self, GraphError> {
        let nodes = StageId::DETECTION
            .iter()
            .chain(StageId::POSE.iter())
            .map(|&s| StageNode::standard(s))
            .collect();
        Self::new(nodes, &[BufferId::Color, BufferId::Depth])
    }

    /// Nodes in execution order.
    pub fn nodes(&self) -> &[StageNode] {
        &self.nodes
    }

    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.nodes.iter().map(|n| n.stage)
    }

    pub fn sources(&self) -> &[BufferId] {
        &self.sources
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.nodes.iter().any(|n| n.stage == stage)
    }
}
