//! Configuration for a voxelization sequence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::Result;
use crate::geometry::VolumeSizing;

/// Everything a sequence run needs, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Simulation file to read.
    pub source: PathBuf,

    /// Virtual planes inserted between each pair of raw planes.
    pub plane_interp_steps: usize,

    /// Interpolated frames exported between each pair of time records.
    pub time_interp_steps: usize,

    /// Scalar field averaged into the voxels.
    pub field: String,

    /// Grid resolution.
    pub sizing: VolumeSizing,

    /// Execution backend.
    pub backend: BackendKind,

    /// Directory receiving the grid files.
    pub output_dir: PathBuf,

    /// Frame file prefix; frames are written as `{base_name}_{counter}`.
    pub base_name: String,

    /// First time record (inclusive).
    pub start: usize,

    /// Last time record (inclusive). `None` means the last record in the file.
    pub end: Option<usize>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("results.slf"),
            plane_interp_steps: 0,
            time_interp_steps: 0,
            field: "VELOCITY U".to_string(),
            sizing: VolumeSizing::default(),
            backend: BackendKind::default(),
            output_dir: PathBuf::from("volumes"),
            base_name: "frame".to_string(),
            start: 0,
            end: None,
        }
    }
}

impl SequenceConfig {
    /// Reads a JSON config; missing keys take their default.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SequenceConfig = serde_json::from_str(
            r#"{
                "source": "run/r3d.slf",
                "sizing": { "voxel_size": [2.0, 2.0, 0.5] },
                "backend": { "kind": "parallel", "threads": 3 },
                "end": 4
            }"#,
        )
        .unwrap();

        assert_eq!(config.source, PathBuf::from("run/r3d.slf"));
        assert_eq!(config.sizing, VolumeSizing::VoxelSize([2.0, 2.0, 0.5]));
        assert_eq!(config.backend, BackendKind::Parallel { threads: 3 });
        assert_eq!(config.end, Some(4));
        assert_eq!(config.base_name, "frame");
        assert_eq!(config.time_interp_steps, 0);
    }

    #[test]
    fn test_round_trip_default() {
        let config = SequenceConfig::default();
        let json = config.to_json().unwrap();
        let back: SequenceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
