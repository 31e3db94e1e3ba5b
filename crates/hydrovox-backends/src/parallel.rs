//! Thread-parallel backend over one shared grid buffer.
//!
//! Work is split statically: column ids for `prepare` and voxel ids for `fill`
//! are cut into `threads` contiguous ranges. Workers only read the shared mesh
//! and index, and each writes its own disjoint slice of the grid, so the only
//! synchronization is the join at the end of each call.

use std::ops::Range;

use hydrovox_core::{
    build_column_range, voxel_density, ColumnIndex, DensityGrid, MeshSnapshot, Result,
    VolumeGeometry, VoxelBackend, VoxelError, ZBounds,
};
use rayon::prelude::*;

use crate::host::HostIndex;

/// Fixed pool of worker threads.
pub struct ParallelBackend {
    pool: rayon::ThreadPool,
    threads: usize,
    prepared: Option<HostIndex>,
}

impl ParallelBackend {
    /// Builds a pool of exactly `threads` workers.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(VoxelError::UnavailableBackend(
                "parallel backend needs at least one thread".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("hydrovox-worker-{i}"))
            .build()
            .map_err(|e| VoxelError::UnavailableBackend(e.to_string()))?;

        Ok(Self {
            pool,
            threads,
            prepared: None,
        })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }
}

/// Splits `0..len` into at most `parts` contiguous, non-empty ranges.
pub(crate) fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let chunk = len.div_ceil(parts.max(1)).max(1);
    (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect()
}

impl VoxelBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn prepare(
        &mut self,
        geometry: &VolumeGeometry,
        x: &[f64],
        y: &[f64],
        plane_count: usize,
    ) -> Result<()> {
        let ranges = partition(geometry.column_count(), self.threads);
        let chunks: Vec<Vec<Vec<u32>>> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| build_column_range(geometry, x, y, plane_count, range))
                .collect::<Result<_>>()
        })?;

        let columns =
            ColumnIndex::from_columns(chunks.into_iter().flatten().collect(), x.len(), plane_count);
        log::info!(
            "parallel({}): indexed {} columns, {} candidates",
            self.threads,
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
            .ok_or(VoxelError::NotPrepared("parallel"))?;
        index.check(snapshot, grid)?;

        let chunk = grid.len().div_ceil(self.threads).max(1);
        let cells = grid.as_mut_slice();
        self.pool.install(|| {
            cells
                .par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(worker, slice)| {
                    let start = worker * chunk;
                    for (offset, cell) in slice.iter_mut().enumerate() {
                        *cell =
                            voxel_density(&index.columns, &index.bounds, snapshot, start + offset);
                    }
                });
        });
        Ok(())
    }
}
