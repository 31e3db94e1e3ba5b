//! GPU compute backend for hydrovox.
//!
//! This crate provides the wgpu side of the voxel fill:
//! - Headless device setup ([`GpuContext`])
//! - Storage/uniform/readback buffer helpers
//! - The fill compute pipeline (WGSL), one invocation per voxel

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod context;
pub mod error;
pub mod fill_kernel;

pub use context::GpuContext;
pub use error::{GpuError, GpuResult};
pub use fill_kernel::{dispatch_size, ColumnBuffers, FillKernel, FillParams, WORKGROUP_SIZE};
