use std::sync::{mpsc, Arc, Mutex};

use voxheat_core::VoxelError;

/// An acquired compute device and its submission queue.
///
/// Passed explicitly to everything that allocates or dispatches device work.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    pub backend: String,
}

impl GpuContext {
    /// Request an adapter with compute support and open a device on it.
    ///
    /// Fails with `DeviceUnavailable` when no adapter is found, the adapter cannot run
    /// compute shaders, or device creation is refused.
    pub async fn try_acquire() -> Result<Self, VoxelError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| VoxelError::DeviceUnavailable("no suitable GPU adapter found".into()))?;

        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(VoxelError::DeviceUnavailable(format!(
                "adapter '{}' does not support compute shaders",
                info.name
            )));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("voxheat-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| VoxelError::DeviceUnavailable(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            log::error!("Uncaptured device error: {}", error);
        }));

        log::info!("GPU: {} ({:?})", info.name, info.backend);
        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
            backend: format!("{:?}", info.backend),
        })
    }

    /// Blocking form of [`GpuContext::try_acquire`].
    pub fn acquire_blocking() -> Result<Self, VoxelError> {
        pollster::block_on(Self::try_acquire())
    }

    /// Largest workgroup count a single dispatch may use along any axis.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }

    /// Submit `encoder` and block until the queue has drained it.
    ///
    /// Validation failures in the recorded commands surface here as
    /// `DeviceExecutionFailure`.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<(), VoxelError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        let error = pollster::block_on(self.device.pop_error_scope());
        let _ = self.device.poll(wgpu::Maintain::wait_for(index));
        match error {
            Some(error) => Err(VoxelError::DeviceExecutionFailure(error.to_string())),
            None => Ok(()),
        }
    }

    /// Map a slice of a `MAP_READ` buffer and wait for the mapping to complete.
    pub fn map_read(&self, slice: &wgpu::BufferSlice<'_>) -> Result<(), VoxelError> {
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| VoxelError::DeviceExecutionFailure("buffer map callback dropped".into()))?
            .map_err(|e| VoxelError::DeviceExecutionFailure(e.to_string()))
    }
}

/// Lazily acquired device shared by every device-backed component.
///
/// The first successful acquisition is memoized. A failed attempt is not, so a later
/// call may retry.
pub struct SharedDevice {
    enabled: bool,
    slot: Mutex<Option<Arc<GpuContext>>>,
}

impl Default for SharedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedDevice {
    pub fn new() -> Self {
        Self {
            enabled: true,
            slot: Mutex::new(None),
        }
    }

    /// A handle that never acquires a device. Every `acquire` reports `DeviceUnavailable`.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            slot: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn cached(&self) -> Option<Arc<GpuContext>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Return the shared context, acquiring it on first use.
    ///
    /// Concurrent first calls may each request a device; the first to finish wins
    /// and the others are dropped.
    pub async fn acquire(&self) -> Result<Arc<GpuContext>, VoxelError> {
        if !self.enabled {
            return Err(VoxelError::DeviceUnavailable("device path disabled".into()));
        }
        if let Some(ctx) = self.cached() {
            return Ok(ctx);
        }
        // The lock is not held across the await.
        let ctx = Arc::new(GpuContext::try_acquire().await?);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(slot.get_or_insert(ctx)))
    }

    pub fn acquire_blocking(&self) -> Result<Arc<GpuContext>, VoxelError> {
        pollster::block_on(self.acquire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_device_is_unavailable() {
        let shared = SharedDevice::disabled();
        assert!(!shared.is_enabled());
        assert!(matches!(
            shared.acquire_blocking(),
            Err(VoxelError::DeviceUnavailable(_))
        ));
        // Still unavailable on retry.
        assert!(matches!(
            shared.acquire_blocking(),
            Err(VoxelError::DeviceUnavailable(_))
        ));
    }

    #[cfg(feature = "gpu_tests")]
    #[test]
    fn test_acquire_is_memoized() {
        let shared = SharedDevice::new();
        let Ok(first) = shared.acquire_blocking() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };
        let second = shared.acquire_blocking().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
