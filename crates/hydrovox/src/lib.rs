//! hydrovox: voxelize layered, time-varying simulation meshes.
//!
//! A Selafin result file is sampled at each time point (with optional time and
//! plane interpolation), binned into a column index once, and averaged into a
//! regular density grid per frame. Grids are written as Mitsuba `.vol` volumes,
//! each with a JSON manifest naming its field.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use hydrovox::{BackendKind, SequenceConfig, VolumeSizing};
//!
//! fn main() -> hydrovox::Result<()> {
//!     let config = SequenceConfig {
//!         source: "r3d_tidal_flats.slf".into(),
//!         field: "VELOCITY U".into(),
//!         sizing: VolumeSizing::Dimensions([128, 128, 32]),
//!         backend: BackendKind::Parallel { threads: 8 },
//!         time_interp_steps: 3,
//!         ..SequenceConfig::default()
//!     };
//!     let report = hydrovox::run(&config, &AtomicBool::new(false))?;
//!     println!("wrote {} frames", report.frames.len());
//!     Ok(())
//! }
//! ```
//!
//! Lower-level pieces are available for custom pipelines: [`MeshSampler`] over
//! any [`SimulationReader`], a [`VoxelEngine`] around any [`VoxelBackend`], and
//! [`run_sequence`] to drive them.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod engine;
pub mod selafin;
pub mod sequence;
pub mod vol;
pub mod writer;

pub use engine::VoxelEngine;
pub use selafin::{open_selafin, Precision, SelafinFile, SelafinReader};
pub use sequence::{run, run_sequence, FramePlan, SequenceReport};
pub use vol::{VolWriter, VolumeManifest};
pub use writer::{GridWriter, NamedGrid};

pub use hydrovox_backends::{create_backend, GpuBackend, ParallelBackend, SequentialBackend};
pub use hydrovox_core::{
    BackendKind, ColumnIndex, DVec3, DensityGrid, FieldSet, MemoryReader, MeshBounds, MeshSampler,
    MeshSnapshot, Result, SequenceConfig, SimulationReader, UVec3, VolumeGeometry, VolumeSizing,
    VoxelBackend, VoxelError, ZBounds, ELEVATION_FIELDS,
};
