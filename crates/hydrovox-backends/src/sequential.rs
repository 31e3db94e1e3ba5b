//! Single-threaded backend.

use hydrovox_core::{
    voxel_density, ColumnIndex, DensityGrid, MeshSnapshot, Result, VolumeGeometry, VoxelBackend,
    VoxelError, ZBounds,
};

use crate::host::HostIndex;

/// Builds the column index and fills every voxel on the calling thread.
#[derive(Default)]
pub struct SequentialBackend {
    prepared: Option<HostIndex>,
}

impl SequentialBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoxelBackend for SequentialBackend {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn prepare(
        &mut self,
        geometry: &VolumeGeometry,
        x: &[f64],
        y: &[f64],
        plane_count: usize,
    ) -> Result<()> {
        let columns = ColumnIndex::build(geometry, x, y, plane_count)?;
        log::info!(
            "sequential: indexed {} columns, {} candidates",
            columns.len(),
            columns.total_candidates()
        );
        self.prepared = Some(HostIndex {
            columns,
            bounds: ZBounds::new(geometry),
            voxel_count: geometry.voxel_count(),
        });
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    fn fill(&mut self, snapshot: &MeshSnapshot, grid: &mut DensityGrid) -> Result<()> {
        let index = self
            .prepared
            .as_ref()
            .ok_or(VoxelError::NotPrepared(self.name()))?;
        index.check(snapshot, grid)?;

        for (voxel_id, cell) in grid.as_mut_slice().iter_mut().enumerate() {
            *cell = voxel_density(&index.columns, &index.bounds, snapshot, voxel_id);
        }
        Ok(())
    }
}
