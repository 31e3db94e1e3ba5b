//! Execution backends for hydrovox.
//!
//! Every backend implements [`VoxelBackend`] and produces the same grid for the
//! same input:
//! - [`SequentialBackend`] runs on the calling thread
//! - [`ParallelBackend`] splits columns and voxels over a fixed thread pool
//! - [`GpuBackend`] runs one compute invocation per voxel through wgpu

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::new_without_default)]

mod host;

pub mod gpu;
pub mod parallel;
pub mod sequential;

pub use gpu::GpuBackend;
pub use parallel::ParallelBackend;
pub use sequential::SequentialBackend;

use hydrovox_core::{BackendKind, Result, VoxelBackend};

/// Instantiates the backend selected by `kind`.
///
/// Fails with `UnavailableBackend` when the backend cannot run here (no GPU
/// adapter, zero threads).
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn VoxelBackend>> {
    let backend: Box<dyn VoxelBackend> = match kind {
        BackendKind::Sequential => Box::new(SequentialBackend::new()),
        BackendKind::Parallel { threads } => Box::new(ParallelBackend::new(threads)?),
        BackendKind::Gpu => Box::new(GpuBackend::new()?),
    };
    log::debug!("created {kind} backend");
    Ok(backend)
}
