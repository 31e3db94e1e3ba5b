//! GPU backend: one compute invocation per voxel.

#![allow(clippy::cast_possible_truncation)]

use hydrovox_core::{
    ColumnIndex, DensityGrid, MeshSnapshot, Result, VolumeGeometry, VoxelBackend, VoxelError,
    ZBounds,
};
use hydrovox_gpu::{ColumnBuffers, FillKernel, GpuContext, GpuError};

/// Device state kept between `prepare` and the fills.
struct DeviceIndex {
    buffers: ColumnBuffers,
    /// Elevation subtracted before narrowing to `f32`.
    z_reference: f64,
    vertices_per_plane: usize,
    plane_count: usize,
}

/// Runs the density fill as a wgpu compute shader.
///
/// The column index is built on the host, packed, and uploaded once; each fill
/// only uploads elevations and scalars and reads the grid back.
pub struct GpuBackend {
    ctx: GpuContext,
    kernel: FillKernel,
    prepared: Option<DeviceIndex>,
}

impl GpuBackend {
    /// Acquires a headless device. Fails with `UnavailableBackend` when no
    /// compute-capable adapter exists.
    pub fn new() -> Result<Self> {
        let ctx = GpuContext::new_blocking().map_err(unavailable)?;
        let kernel = FillKernel::new(&ctx.device);
        Ok(Self {
            ctx,
            kernel,
            prepared: None,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_info.name
    }
}

fn unavailable(error: GpuError) -> VoxelError {
    VoxelError::UnavailableBackend(format!("gpu: {error}"))
}

fn failed(error: GpuError) -> VoxelError {
    VoxelError::BackendFailed(format!("gpu: {error}"))
}

impl VoxelBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn prepare(
        &mut self,
        geometry: &VolumeGeometry,
        x: &[f64],
        y: &[f64],
        plane_count: usize,
    ) -> Result<()> {
        let columns = ColumnIndex::build(geometry, x, y, plane_count)?;
        let packed = columns.pack()?;

        let z_reference = geometry.grid_min().z;
        let zmin: Vec<f32> = ZBounds::new(geometry)
            .zmin
            .iter()
            .map(|&z| (z - z_reference) as f32)
            .collect();

        let buffers = self
            .kernel
            .upload(
                &self.ctx,
                &packed,
                &zmin,
                geometry.dims().to_array(),
                geometry.voxel_size().z as f32,
                x.len() * plane_count,
            )
            .map_err(|e| match e {
                GpuError::BufferTooLarge { .. } => unavailable(e),
                other => failed(other),
            })?;

        log::info!(
            "gpu({}): uploaded {} columns, {} candidates",
            self.ctx.adapter_info.name,
            columns.len(),
            columns.total_candidates()
        );
        self.prepared = Some(DeviceIndex {
            buffers,
            z_reference,
            vertices_per_plane: x.len(),
            plane_count,
        });
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    fn fill(&mut self, snapshot: &MeshSnapshot, grid: &mut DensityGrid) -> Result<()> {
        let index = self.prepared.as_ref().ok_or(VoxelError::NotPrepared("gpu"))?;
        for (expected, actual) in [
            (index.vertices_per_plane, snapshot.vertices_per_plane()),
            (index.plane_count, snapshot.plane_count()),
            (index.buffers.voxel_count(), grid.len()),
        ] {
            if expected != actual {
                return Err(VoxelError::SizeMismatch { expected, actual });
            }
        }

        let vertex_z: Vec<f32> = snapshot
            .z()
            .iter()
            .map(|&z| (z - index.z_reference) as f32)
            .collect();
        let scalar: Vec<f32> = snapshot.scalar().iter().map(|&s| s as f32).collect();

        let densities = self
            .kernel
            .run(&self.ctx, &index.buffers, &vertex_z, &scalar)
            .map_err(failed)?;
        if densities.len() != grid.len() {
            return Err(VoxelError::BackendFailed(format!(
                "gpu: read back {} densities for {} voxels",
                densities.len(),
                grid.len()
            )));
        }
        grid.as_mut_slice().copy_from_slice(&densities);
        Ok(())
    }
}
