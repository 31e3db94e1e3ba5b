//! Compute pipeline for the voxel density fill.

#![allow(clippy::cast_possible_truncation)]

use std::num::NonZeroU64;

use pollster::FutureExt;

use crate::buffer::{
    create_output_buffer, create_readback_buffer, create_storage_buffer, create_uniform_buffer,
    non_empty, update_buffer,
};
use crate::context::GpuContext;
use crate::error::{GpuError, GpuResult};

/// Invocations per workgroup; must match `@workgroup_size` in the shader.
pub const WORKGROUP_SIZE: u32 = 64;

/// Uniform block of the fill shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FillParams {
    /// `nx, ny, nz, nx * ny * nz`.
    pub dims: [u32; 4],
    pub voxel_height: f32,
    pub dispatch_width: u32,
    pub _pad: [u32; 2],
}

/// Workgroup grid for `voxel_count` invocations: `(groups_x, groups_y, invocations_per_row)`.
///
/// Folds into a second dimension once `groups_x` would exceed `max_per_dimension`.
#[must_use]
pub fn dispatch_size(voxel_count: u32, max_per_dimension: u32) -> (u32, u32, u32) {
    let groups = voxel_count.div_ceil(WORKGROUP_SIZE).max(1);
    let groups_x = groups.min(max_per_dimension.max(1));
    let groups_y = groups.div_ceil(groups_x);
    (groups_x, groups_y, groups_x * WORKGROUP_SIZE)
}

/// Device buffers for one prepared geometry, reused by every fill.
pub struct ColumnBuffers {
    vertex_count: usize,
    voxel_count: usize,
    workgroups: (u32, u32),
    vertex_z: wgpu::Buffer,
    scalar: wgpu::Buffer,
    density: wgpu::Buffer,
    readback: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ColumnBuffers {
    /// Number of `f32` values expected for elevation and scalar uploads.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.voxel_count
    }
}

/// The fill pipeline and its bind group layout.
pub struct FillKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl FillKernel {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Voxel Fill Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/voxel_fill.wgsl").into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxel Fill Bind Group Layout"),
            entries: &[
                // Packed columns
                storage(0, true),
                // Per-layer zmin
                storage(1, true),
                // Vertex elevation
                storage(2, true),
                // Vertex scalar
                storage(3, true),
                // Density output
                storage(4, false),
                // Params
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<FillParams>() as u64),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Voxel Fill Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Voxel Fill Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
        }
    }

    /// Uploads the packed column index and layer windows.
    ///
    /// `zmin` must already be expressed in the same frame as the elevations
    /// passed to [`run`](Self::run).
    pub fn upload(
        &self,
        ctx: &GpuContext,
        packed_columns: &[u32],
        zmin: &[f32],
        dims: [u32; 3],
        voxel_height: f32,
        vertex_count: usize,
    ) -> GpuResult<ColumnBuffers> {
        let voxel_count = dims[0] as usize * dims[1] as usize * dims[2] as usize;
        let voxel_count_u32 = u32::try_from(voxel_count).map_err(|_| GpuError::BufferTooLarge {
            label: "density",
            size: voxel_count as u64 * 4,
            limit: u64::from(u32::MAX),
        })?;
        let density_bytes = (voxel_count.max(1) * 4) as u64;
        let vertex_bytes = (vertex_count.max(1) * 4) as u64;

        ctx.check_storage_size("columns", (packed_columns.len() * 4) as u64)?;
        ctx.check_storage_size("vertex_z", vertex_bytes)?;
        ctx.check_storage_size("density", density_bytes)?;

        let (groups_x, groups_y, dispatch_width) =
            dispatch_size(voxel_count_u32, ctx.limits.max_compute_workgroups_per_dimension);
        let params = FillParams {
            dims: [dims[0], dims[1], dims[2], voxel_count_u32],
            voxel_height,
            dispatch_width,
            _pad: [0; 2],
        };

        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let columns = create_storage_buffer(device, &non_empty(packed_columns), Some("Fill Columns"));
        let zmin = create_storage_buffer(device, &non_empty(zmin), Some("Fill Layer Zmin"));
        let vertex_z = create_storage_buffer(
            device,
            &vec![0.0_f32; vertex_count.max(1)],
            Some("Fill Vertex Z"),
        );
        let scalar = create_storage_buffer(
            device,
            &vec![0.0_f32; vertex_count.max(1)],
            Some("Fill Vertex Scalar"),
        );
        let density = create_output_buffer(device, density_bytes, Some("Fill Density"));
        let readback = create_readback_buffer(device, density_bytes, Some("Fill Readback"));
        let params_buffer = create_uniform_buffer(device, &params, Some("Fill Params"));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Fill Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: columns.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: zmin.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: vertex_z.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: scalar.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: density.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        pop_error_scopes(device)?;

        log::debug!(
            "uploaded {} column words, dispatch {}x{} workgroups",
            packed_columns.len(),
            groups_x,
            groups_y
        );

        Ok(ColumnBuffers {
            vertex_count,
            voxel_count,
            workgroups: (groups_x, groups_y),
            vertex_z,
            scalar,
            density,
            readback,
            bind_group,
        })
    }

    /// Runs one fill and reads the densities back. Blocks until the device is done.
    pub fn run(
        &self,
        ctx: &GpuContext,
        buffers: &ColumnBuffers,
        vertex_z: &[f32],
        scalar: &[f32],
    ) -> GpuResult<Vec<f32>> {
        for len in [vertex_z.len(), scalar.len()] {
            if len != buffers.vertex_count {
                return Err(GpuError::SizeMismatch {
                    expected: buffers.vertex_count,
                    actual: len,
                });
            }
        }

        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        if !vertex_z.is_empty() {
            update_buffer(&ctx.queue, &buffers.vertex_z, vertex_z);
            update_buffer(&ctx.queue, &buffers.scalar, scalar);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Voxel Fill Encoder"),
        });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Voxel Fill Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &buffers.bind_group, &[]);
            compute_pass.dispatch_workgroups(buffers.workgroups.0, buffers.workgroups.1, 1);
        }
        let bytes = (buffers.voxel_count * 4) as u64;
        if bytes > 0 {
            encoder.copy_buffer_to_buffer(&buffers.density, 0, &buffers.readback, 0, bytes);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));

        if let Some(error) = device.pop_error_scope().block_on() {
            return Err(GpuError::Device(error.to_string()));
        }
        if bytes == 0 {
            return Ok(Vec::new());
        }

        // Map staging buffer and read densities
        let buffer_slice = buffers.readback.slice(..bytes);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        ctx.wait()?;
        rx.recv()
            .map_err(|_| GpuError::MapFailed("map callback dropped".into()))?
            .map_err(|e| GpuError::MapFailed(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let densities: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        buffers.readback.unmap();

        Ok(densities)
    }
}

fn pop_error_scopes(device: &wgpu::Device) -> GpuResult<()> {
    let validation = device.pop_error_scope().block_on();
    let out_of_memory = device.pop_error_scope().block_on();
    match validation.or(out_of_memory) {
        Some(error) => Err(GpuError::Device(error.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<FillParams>(), 32);
    }

    #[test]
    fn test_dispatch_size_single_row() {
        assert_eq!(dispatch_size(1, 65535), (1, 1, 64));
        assert_eq!(dispatch_size(64, 65535), (1, 1, 64));
        assert_eq!(dispatch_size(65, 65535), (2, 1, 128));
    }

    #[test]
    fn test_dispatch_size_folds() {
        let (x, y, width) = dispatch_size(10_000, 16);
        // 157 groups folded into rows of 16
        assert_eq!((x, y, width), (16, 10, 16 * 64));
        assert!(x * y * WORKGROUP_SIZE >= 10_000);
    }
}
