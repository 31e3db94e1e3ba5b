//! Execution backend trait for column indexing and voxel filling.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::VolumeGeometry;
use crate::grid::DensityGrid;
use crate::mesh::MeshSnapshot;

/// Which backend runs `prepare`/`fill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    /// Single thread.
    #[default]
    Sequential,
    /// Fixed pool of worker threads over one shared grid buffer.
    Parallel { threads: usize },
    /// One device thread per voxel.
    Gpu,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel { threads } => write!(f, "parallel({threads})"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// One strategy for building the column index and filling density grids.
///
/// `prepare` must run once per geometry before any `fill`. A backend keeps
/// whatever it built (host vectors, device buffers) until the next `prepare`.
pub trait VoxelBackend: Send {
    /// Short backend name for logs and errors.
    fn name(&self) -> &'static str;

    /// Bins the mesh's planar coordinates into the columns of `geometry`.
    fn prepare(
        &mut self,
        geometry: &VolumeGeometry,
        x: &[f64],
        y: &[f64],
        plane_count: usize,
    ) -> Result<()>;

    /// Whether `prepare` has completed.
    fn is_prepared(&self) -> bool;

    /// Overwrites every voxel of `grid` with the mean of the snapshot's scalar.
    fn fill(&mut self, snapshot: &MeshSnapshot, grid: &mut DensityGrid) -> Result<()>;
}

impl<B: VoxelBackend + ?Sized> VoxelBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn prepare(
        &mut self,
        geometry: &VolumeGeometry,
        x: &[f64],
        y: &[f64],
        plane_count: usize,
    ) -> Result<()> {
        (**self).prepare(geometry, x, y, plane_count)
    }

    fn is_prepared(&self) -> bool {
        (**self).is_prepared()
    }

    fn fill(&mut self, snapshot: &MeshSnapshot, grid: &mut DensityGrid) -> Result<()> {
        (**self).fill(snapshot, grid)
    }
}
