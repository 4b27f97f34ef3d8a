use std::fmt;

use glam::UVec3;

use crate::channel::{ChannelData, ChannelLayout, Element};
use crate::error::VoxelError;

/// `index` result for `x < 0`.
pub const INDEX_X_BELOW: i64 = -1;
/// `index` result for `x >= size.x`.
pub const INDEX_X_ABOVE: i64 = -2;
/// `index` result for `y < 0`.
pub const INDEX_Y_BELOW: i64 = -3;
/// `index` result for `y >= size.y`.
pub const INDEX_Y_ABOVE: i64 = -4;
/// `index` result for `z < 0`.
pub const INDEX_Z_BELOW: i64 = -5;
/// `index` result for `z >= size.z`.
pub const INDEX_Z_ABOVE: i64 = -6;

/// Width of one value cell in `debug_dump` output.
const DUMP_CELL_WIDTH: usize = 8;

/// One named, uniformly typed buffer of a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub data: ChannelData,
}

/// A 3-D grid of voxels with named, same-length typed channels.
///
/// Voxels are laid out x-major: x varies fastest, then y, then z.
/// Every channel holds exactly `size.x * size.y * size.z` elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    size: UVec3,
    channels: Vec<Channel>,
}

/// Number of voxels in a grid of `size`.
pub fn voxel_count(size: UVec3) -> usize {
    size.x as usize * size.y as usize * size.z as usize
}

impl Volume {
    /// Allocate a zeroed buffer for every channel in `layout`.
    ///
    /// Fails with `UnsupportedChannelType` if a channel's scalar type has no host element type.
    pub fn create(size: UVec3, layout: &ChannelLayout) -> Result<Self, VoxelError> {
        let len = voxel_count(size);
        let channels = layout
            .iter()
            .map(|(name, kind)| {
                ChannelData::zeroed(kind, len)
                    .map(|data| Channel {
                        name: name.to_string(),
                        data,
                    })
                    .ok_or_else(|| VoxelError::UnsupportedChannelType {
                        channel: name.to_string(),
                        kind,
                        side: "host",
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { size, channels })
    }

    /// Wrap caller-supplied buffers, one per layout entry in layout order.
    ///
    /// Every buffer must match its channel's type and hold exactly `voxel_count` elements.
    pub fn with_data(
        size: UVec3,
        layout: &ChannelLayout,
        data: Vec<ChannelData>,
    ) -> Result<Self, VoxelError> {
        if data.len() != layout.len() {
            return Err(VoxelError::ChannelCountMismatch {
                expected: layout.len(),
                actual: data.len(),
            });
        }
        let len = voxel_count(size);
        let channels = layout
            .iter()
            .zip(data)
            .map(|((name, kind), data)| {
                if data.kind() != kind {
                    return Err(VoxelError::ChannelTypeMismatch {
                        channel: name.to_string(),
                        expected: kind,
                        actual: data.kind(),
                    });
                }
                if data.len() != len {
                    return Err(VoxelError::LengthMismatch {
                        channel: name.to_string(),
                        expected: len,
                        actual: data.len(),
                    });
                }
                Ok(Channel {
                    name: name.to_string(),
                    data,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { size, channels })
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn voxel_count(&self) -> usize {
        voxel_count(self.size)
    }

    /// The channel names and types, in creation order.
    pub fn layout(&self) -> ChannelLayout {
        let mut layout = ChannelLayout::new();
        for channel in &self.channels {
            // Names were unique at construction.
            let _ = layout.push(&channel.name, channel.data.kind());
        }
        layout
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Linear index of `(x, y, z)`, or a negative sentinel naming the violated bound.
    ///
    /// `index = x + (y + z * size.y) * size.x`. Callers must check for negative
    /// results before indexing channel buffers.
    pub fn index(&self, x: i64, y: i64, z: i64) -> i64 {
        let size_x = self.size.x as i64;
        let size_y = self.size.y as i64;
        let size_z = self.size.z as i64;
        if x < 0 {
            return INDEX_X_BELOW;
        }
        if x >= size_x {
            return INDEX_X_ABOVE;
        }
        if y < 0 {
            return INDEX_Y_BELOW;
        }
        if y >= size_y {
            return INDEX_Y_ABOVE;
        }
        if z < 0 {
            return INDEX_Z_BELOW;
        }
        if z >= size_z {
            return INDEX_Z_ABOVE;
        }
        x + (y + z * size_y) * size_x
    }

    /// Checked variant of [`Volume::index`] for in-range unsigned coordinates.
    pub fn checked_index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        let index = self.index(x as i64, y as i64, z as i64);
        (index >= 0).then_some(index as usize)
    }

    pub fn channel(&self, name: &str) -> Result<&ChannelData, VoxelError> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| VoxelError::MissingChannel(name.to_string()))
    }

    pub fn channel_mut(&mut self, name: &str) -> Result<&mut ChannelData, VoxelError> {
        self.channels
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.data)
            .ok_or_else(|| VoxelError::MissingChannel(name.to_string()))
    }

    /// Typed view of a channel. Fails if missing or of another element type.
    pub fn typed<T: Element>(&self, name: &str) -> Result<&[T], VoxelError> {
        let data = self.channel(name)?;
        let actual = data.kind();
        data.as_slice::<T>()
            .ok_or_else(|| VoxelError::ChannelTypeMismatch {
                channel: name.to_string(),
                expected: T::KIND,
                actual,
            })
    }

    /// Typed mutable view of a channel.
    pub fn typed_mut<T: Element>(&mut self, name: &str) -> Result<&mut [T], VoxelError> {
        let data = self.channel_mut(name)?;
        let actual = data.kind();
        data.as_mut_slice::<T>()
            .ok_or_else(|| VoxelError::ChannelTypeMismatch {
                channel: name.to_string(),
                expected: T::KIND,
                actual,
            })
    }

    /// Mutable access to several distinct channels at once, in the order requested.
    pub fn channels_mut<const N: usize>(
        &mut self,
        names: [&str; N],
    ) -> Result<[&mut ChannelData; N], VoxelError> {
        let mut slots: [Option<&mut ChannelData>; N] = std::array::from_fn(|_| None);
        for channel in self.channels.iter_mut() {
            if let Some(slot) = names.iter().position(|n| *n == channel.name) {
                slots[slot] = Some(&mut channel.data);
            }
        }
        let mut found = Vec::with_capacity(N);
        for (slot, name) in slots.into_iter().zip(names) {
            found.push(slot.ok_or_else(|| VoxelError::MissingChannel(name.to_string()))?);
        }
        found
            .try_into()
            .map_err(|_| VoxelError::ChannelCountMismatch {
                expected: N,
                actual: 0,
            })
    }

    /// Replace one channel's buffer. The new buffer must keep the type and length.
    pub fn replace_channel(&mut self, name: &str, data: ChannelData) -> Result<(), VoxelError> {
        let len = self.voxel_count();
        let target = self.channel_mut(name)?;
        if target.kind() != data.kind() {
            return Err(VoxelError::ChannelTypeMismatch {
                channel: name.to_string(),
                expected: target.kind(),
                actual: data.kind(),
            });
        }
        if data.len() != len {
            return Err(VoxelError::LengthMismatch {
                channel: name.to_string(),
                expected: len,
                actual: data.len(),
            });
        }
        *target = data;
        Ok(())
    }

    /// Render one channel as rows of x values, y rows per slice, top z slice first.
    pub fn debug_dump(&self, name: &str) -> Result<String, VoxelError> {
        let data = self.channel(name)?;
        let mut out = format!("  {name}:\n\n");
        for z in (0..self.size.z).rev() {
            for y in 0..self.size.y {
                for x in 0..self.size.x {
                    let value = self
                        .checked_index(x, y, z)
                        .and_then(|i| data.element_at(i))
                        .unwrap_or(f64::NAN);
                    let text: String = format!("{value:.2}").chars().take(DUMP_CELL_WIDTH).collect();
                    out.push_str(&format!("{text:>width$},", width = DUMP_CELL_WIDTH));
                }
                out.push('\n');
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Volume[{}, {}, {}]\n\n",
            self.size.x, self.size.y, self.size.z
        )?;
        let dumps: Vec<String> = self
            .channels
            .iter()
            .filter_map(|c| self.debug_dump(&c.name).ok())
            .collect();
        f.write_str(&dumps.join("\n"))
    }
}
