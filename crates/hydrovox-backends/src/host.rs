//! Column index state shared by the CPU backends.

use hydrovox_core::{ColumnIndex, DensityGrid, MeshSnapshot, Result, VoxelError, ZBounds};

/// What a CPU backend keeps after `prepare`.
pub(crate) struct HostIndex {
    pub columns: ColumnIndex,
    pub bounds: ZBounds,
    pub voxel_count: usize,
}

impl HostIndex {
    /// Rejects snapshots and grids that do not belong to the prepared geometry.
    pub fn check(&self, snapshot: &MeshSnapshot, grid: &DensityGrid) -> Result<()> {
        self.columns.check_snapshot(snapshot)?;
        if grid.len() != self.voxel_count {
            return Err(VoxelError::SizeMismatch {
                expected: self.voxel_count,
                actual: grid.len(),
            });
        }
        Ok(())
    }
}
