use std::sync::Arc;

use glam::UVec3;
use voxheat_core::volume::voxel_count;
use voxheat_core::{ChannelLayout, ScalarKind, Volume, VoxelError};

use crate::context::GpuContext;

/// Requested host access for a [`GpuVolume`]'s buffers.
///
/// Every buffer is a storage buffer. `read` adds `COPY_SRC` for readback, `write` adds
/// `COPY_DST` for uploads, `mapped_at_creation` allocates the buffers pre-mapped so the
/// initial contents can be written without a queue transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeAccess {
    pub read: bool,
    pub write: bool,
    pub mapped_at_creation: bool,
}

impl VolumeAccess {
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        mapped_at_creation: false,
    };

    pub fn usage(&self) -> wgpu::BufferUsages {
        let mut usage = wgpu::BufferUsages::STORAGE;
        if self.read {
            usage |= wgpu::BufferUsages::COPY_SRC;
        }
        if self.write {
            usage |= wgpu::BufferUsages::COPY_DST;
        }
        usage
    }
}

/// Bytes actually allocated for `logical` bytes of channel data.
///
/// Rounded up to `COPY_BUFFER_ALIGNMENT` with a floor of one word so that empty
/// and sub-word channels remain valid storage bindings.
pub fn padded_size(logical: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    logical.max(align).div_ceil(align) * align
}

/// Largest buffer a volume channel may occupy: it must be allocatable and bindable as
/// a whole storage buffer.
pub fn buffer_limit(limits: &wgpu::Limits) -> u64 {
    limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64)
}

fn check_buffer_size(channel: &str, size: u64, limit: u64) -> Result<(), VoxelError> {
    if size > limit {
        return Err(VoxelError::BufferTooLarge {
            channel: channel.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// A volume whose channels live in device storage buffers, one buffer per channel.
pub struct GpuVolume {
    ctx: Arc<GpuContext>,
    size: UVec3,
    layout: ChannelLayout,
    access: VolumeAccess,
    /// Parallel to `layout`.
    buffers: Vec<wgpu::Buffer>,
}

impl GpuVolume {
    /// Allocate zero-initialized device buffers for `layout`.
    ///
    /// Channel types without a host representation are allowed here; they only fail
    /// when copied back into a host [`Volume`]. A channel larger than the device's
    /// buffer or storage binding limit fails with `BufferTooLarge` before anything is
    /// allocated.
    pub fn create(
        ctx: &Arc<GpuContext>,
        size: UVec3,
        layout: &ChannelLayout,
        access: VolumeAccess,
    ) -> Result<Self, VoxelError> {
        let count = voxel_count(size) as u64;
        let limit = buffer_limit(&ctx.device.limits());
        let sizes = layout
            .iter()
            .map(|(name, kind)| {
                let bytes = padded_size(count * kind.bytes_per_element() as u64);
                check_buffer_size(name, bytes, limit)?;
                Ok(bytes)
            })
            .collect::<Result<Vec<_>, VoxelError>>()?;

        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffers: Vec<wgpu::Buffer> = layout
            .names()
            .zip(&sizes)
            .map(|(name, &bytes)| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("gpu-volume-{name}")),
                    size: bytes,
                    usage: access.usage(),
                    mapped_at_creation: access.mapped_at_creation,
                })
            })
            .collect();
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            for buffer in &buffers {
                buffer.destroy();
            }
            return Err(VoxelError::DeviceExecutionFailure(format!(
                "device volume allocation failed: {error}"
            )));
        }

        log::debug!(
            "Allocated device volume {}x{}x{} with {} channels",
            size.x,
            size.y,
            size.z,
            layout.len()
        );
        Ok(Self {
            ctx: Arc::clone(ctx),
            size,
            layout: layout.clone(),
            access,
            buffers,
        })
    }

    /// Allocate buffers pre-mapped and initialize them from `volume`'s channels.
    ///
    /// `access.mapped_at_creation` is implied. The buffers are unmapped before return.
    pub fn create_from_host(
        ctx: &Arc<GpuContext>,
        volume: &Volume,
        access: VolumeAccess,
    ) -> Result<Self, VoxelError> {
        let access = VolumeAccess {
            mapped_at_creation: true,
            ..access
        };
        let layout = volume.layout();
        let gpu = Self::create(ctx, volume.size(), &layout, access)?;
        for (channel, buffer) in volume.channels().iter().zip(&gpu.buffers) {
            let bytes = channel.data.as_bytes();
            {
                let mut mapped = buffer.slice(..).get_mapped_range_mut();
                mapped[..bytes.len()].copy_from_slice(bytes);
            }
            buffer.unmap();
        }
        Ok(gpu)
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn access(&self) -> VolumeAccess {
        self.access
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Device buffer backing the named channel.
    pub fn buffer(&self, name: &str) -> Option<&wgpu::Buffer> {
        self.layout.position(name).map(|i| &self.buffers[i])
    }

    fn logical_byte_len(&self, kind: ScalarKind) -> usize {
        voxel_count(self.size) * kind.bytes_per_element()
    }

    /// Every channel of this volume must exist in `volume` with the same element type,
    /// and the sizes must agree.
    fn check_host(&self, volume: &Volume) -> Result<(), VoxelError> {
        if volume.size() != self.size {
            return Err(VoxelError::LengthMismatch {
                channel: "<volume>".into(),
                expected: voxel_count(self.size),
                actual: volume.voxel_count(),
            });
        }
        for (name, kind) in self.layout.iter() {
            let actual = volume.channel(name)?.kind();
            if actual != kind {
                return Err(VoxelError::ChannelTypeMismatch {
                    channel: name.to_string(),
                    expected: kind,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn require(&self, present: bool, usage: &'static str) -> Result<(), VoxelError> {
        if present {
            return Ok(());
        }
        Err(VoxelError::MissingUsage {
            channel: "<volume>".into(),
            usage,
        })
    }

    /// Read every channel back into a new host volume.
    pub fn copy_to_cpu(&self) -> Result<Volume, VoxelError> {
        let mut volume = Volume::create(self.size, &self.layout)?;
        self.copy_into(&mut volume)?;
        Ok(volume)
    }

    /// Read every channel back into the same-named channels of `volume`.
    ///
    /// Channels of `volume` that this device volume does not hold are left alone.
    /// Staging buffers live only for the duration of the call.
    pub fn copy_into(&self, volume: &mut Volume) -> Result<(), VoxelError> {
        self.require(self.access.read, "COPY_SRC")?;
        self.check_host(volume)?;

        let device = &self.ctx.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gpu-volume-readback"),
        });
        let staging: Vec<wgpu::Buffer> = self
            .buffers
            .iter()
            .map(|buffer| {
                let staging = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("gpu-volume-staging"),
                    size: buffer.size(),
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
                staging
            })
            .collect();
        self.ctx.submit_and_wait(encoder)?;

        for ((name, kind), staging) in self.layout.iter().zip(&staging) {
            let slice = staging.slice(..);
            self.ctx.map_read(&slice)?;
            {
                let mapped = slice.get_mapped_range();
                let logical = self.logical_byte_len(kind);
                volume
                    .channel_mut(name)?
                    .copy_from_bytes(&mapped[..logical])?;
            }
            staging.unmap();
            staging.destroy();
        }
        Ok(())
    }

    /// Upload the same-named channels of `volume` into the device buffers.
    pub fn write_from_cpu(&self, volume: &Volume) -> Result<(), VoxelError> {
        self.require(self.access.write, "COPY_DST")?;
        self.check_host(volume)?;

        let sources = self
            .layout
            .names()
            .map(|name| volume.channel(name).map(|channel| channel.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;

        // Queue writes are validated when issued, not when submitted.
        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        for (bytes, buffer) in sources.into_iter().zip(&self.buffers) {
            let padded = padded_size(bytes.len() as u64) as usize;
            if padded == bytes.len() {
                self.ctx.queue.write_buffer(buffer, 0, bytes);
            } else {
                let mut staged = bytes.to_vec();
                staged.resize(padded, 0);
                self.ctx.queue.write_buffer(buffer, 0, &staged);
            }
        }
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(VoxelError::DeviceExecutionFailure(format!(
                "device volume upload failed: {error}"
            )));
        }
        let encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpu-volume-upload"),
            });
        self.ctx.submit_and_wait(encoder)
    }

    /// Release the device buffers immediately.
    pub fn destroy(self) {
        for buffer in &self.buffers {
            buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(0), 4);
        assert_eq!(padded_size(1), 4);
        assert_eq!(padded_size(4), 4);
        assert_eq!(padded_size(5), 8);
        assert_eq!(padded_size(64), 64);
    }

    #[test]
    fn test_buffer_limit_takes_smaller_bound() {
        let limits = wgpu::Limits {
            max_buffer_size: 1 << 30,
            max_storage_buffer_binding_size: 1 << 27,
            ..Default::default()
        };
        assert_eq!(buffer_limit(&limits), 1 << 27);
    }

    #[test]
    fn test_oversize_channel_is_rejected() {
        assert_eq!(check_buffer_size("temperature", 64, 64), Ok(()));
        assert_eq!(
            check_buffer_size("temperature", 68, 64),
            Err(VoxelError::BufferTooLarge {
                channel: "temperature".into(),
                size: 68,
                limit: 64,
            })
        );
    }

    #[test]
    fn test_access_usage_flags() {
        let none = VolumeAccess::default().usage();
        assert_eq!(none, wgpu::BufferUsages::STORAGE);

        let rw = VolumeAccess::READ_WRITE.usage();
        assert!(rw.contains(wgpu::BufferUsages::COPY_SRC));
        assert!(rw.contains(wgpu::BufferUsages::COPY_DST));

        let mapped = VolumeAccess {
            mapped_at_creation: true,
            ..Default::default()
        };
        assert!(!mapped.usage().contains(wgpu::BufferUsages::MAP_WRITE));
    }
}
