//! Error types for hydrovox.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for hydrovox operations.
#[derive(Error, Debug)]
pub enum VoxelError {
    /// The simulation file does not exist.
    #[error("simulation file '{}' not found", .0.display())]
    FileNotFound(PathBuf),

    /// The simulation file exists but could not be decoded.
    #[error("malformed simulation data: {0}")]
    FormatError(String),

    /// None of the candidate field names exist in the current time record.
    #[error("field not found (tried {candidates:?}) at time record {time_index}")]
    FieldNotFound {
        candidates: Vec<String>,
        time_index: usize,
    },

    /// The requested execution backend cannot run on this machine.
    #[error("backend unavailable: {0}")]
    UnavailableBackend(String),

    /// The voxel grid cannot be built from the requested sizing.
    #[error("invalid volume geometry: {0}")]
    InvalidGeometry(String),

    /// A time point outside the available records was requested.
    #[error("time point {index} out of range ({len} records available)")]
    IndexOutOfRange { index: usize, len: usize },

    /// `fill` was called before the column index was prepared.
    #[error("backend '{0}' used before prepare()")]
    NotPrepared(&'static str),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Replicated vertex ids no longer fit in 32 bits.
    #[error("mesh has {0} replicated vertices, more than a 32-bit index can address")]
    TooManyVertices(usize),

    /// Worker or device failure during prepare/fill.
    #[error("backend failure: {0}")]
    BackendFailed(String),

    /// A frame of a sequence failed.
    #[error("frame {time_index}.{sub_step} ('{field}') failed: {source}")]
    FrameFailed {
        time_index: usize,
        sub_step: usize,
        field: String,
        #[source]
        source: Box<VoxelError>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for hydrovox operations.
pub type Result<T> = std::result::Result<T, VoxelError>;
