//! Core abstractions for hydrovox.
//!
//! This crate provides the engine-independent pieces of the mesh-to-volume pipeline:
//! - [`SimulationReader`] for layered, time-varying meshes and [`MeshSampler`] for
//!   time/plane interpolation over them
//! - [`VolumeGeometry`] and [`DensityGrid`] describing the target voxel grid
//! - [`ColumnIndex`] and [`ZBounds`], the per-column spatial index shared by every backend
//! - The [`VoxelBackend`] trait and sequence configuration

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod backend;
pub mod column_index;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod interpolation;
pub mod mesh;
pub mod options;
pub mod reader;
pub mod sampler;

pub use backend::{BackendKind, VoxelBackend};
pub use column_index::{build_column_range, voxel_density, ColumnIndex, ZBounds};
pub use error::{Result, VoxelError};
pub use geometry::{MeshBounds, VolumeGeometry, VolumeSizing};
pub use grid::DensityGrid;
pub use mesh::MeshSnapshot;
pub use options::SequenceConfig;
pub use reader::{FieldSet, MemoryReader, SimulationReader};
pub use sampler::{MeshSampler, ELEVATION_FIELDS};

// Re-export glam types for convenience
pub use glam::{DVec3, UVec3};
