//! JSON pipeline configuration.

use depth_markers_detect::DetectParams;
use depth_markers_pose::{LiftParams, PoseParams, TrackerParams};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::IoError;

/// Every tunable of the ten stages. Missing sections and fields fall back
/// to their defaults, so a partial JSON file is a valid config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detect: DetectParams,
    pub lift: LiftParams,
    pub pose: PoseParams,
    pub tracker: TrackerParams,
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json(path)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(path, self)
    }
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, IoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "tracker": { "reference_id": 7 }, "lift": { "max_depth": 3.5 } }"#)
                .unwrap();
        assert_eq!(cfg.tracker.reference_id, 7);
        assert_eq!(cfg.lift.max_depth, 3.5);
        assert_eq!(cfg.lift.min_depth, LiftParams::default().min_depth);
        assert_eq!(
            cfg.pose.max_sample_dist2,
            PoseParams::default().max_sample_dist2
        );
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let mut cfg = PipelineConfig::default();
        cfg.tracker.reference_id = 12;
        cfg.write_json(&path).unwrap();
        let back = PipelineConfig::load_json(&path).unwrap();
        assert_eq!(back.tracker.reference_id, 12);
        assert!(PipelineConfig::load_json(dir.path().join("missing.json")).is_err());
    }
}
