//! Headless wgpu device setup.

use pollster::FutureExt;

use crate::error::{GpuError, GpuResult};

/// A compute-capable device and its queue, with no surface attached.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub limits: wgpu::Limits,
}

impl GpuContext {
    /// Requests a high-performance adapter and a device carrying the adapter's
    /// own limits, so large meshes can use the biggest storage bindings available.
    pub async fn new_headless() -> GpuResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::AdapterCreationFailed)?;

        let adapter_info = adapter.get_info();
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(GpuError::ComputeUnsupported(adapter_info.name));
        }

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("hydrovox device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!(
            "GPU device: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            limits,
        })
    }

    /// Blocking variant of [`new_headless`](Self::new_headless).
    pub fn new_blocking() -> GpuResult<Self> {
        Self::new_headless().block_on()
    }

    /// Fails if a storage binding of `size` bytes exceeds the device limit.
    pub fn check_storage_size(&self, label: &'static str, size: u64) -> GpuResult<()> {
        let limit = u64::from(self.limits.max_storage_buffer_binding_size).min(self.limits.max_buffer_size);
        if size > limit {
            return Err(GpuError::BufferTooLarge { label, size, limit });
        }
        Ok(())
    }

    /// Blocks until all submitted work is done.
    pub fn wait(&self) -> GpuResult<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| GpuError::Poll(e.to_string()))
    }
}
