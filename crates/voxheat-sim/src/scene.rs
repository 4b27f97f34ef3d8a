//! Scene setup helpers for heat volumes.

use glam::UVec3;
use voxheat_core::constants::{CHANNEL_HEAT, CHANNEL_MATERIAL, CHANNEL_TEMPERATURE};
use voxheat_core::{ChannelLayout, ScalarKind, Volume, VoxelError};

/// `material: u32`, `temperature: f32`, `heat: f32`. Usable by both host and device solvers.
pub fn heat_volume_layout() -> ChannelLayout {
    let mut layout = ChannelLayout::new();
    // Distinct constant names cannot collide.
    let _ = layout.push(CHANNEL_MATERIAL, ScalarKind::U32);
    let _ = layout.push(CHANNEL_TEMPERATURE, ScalarKind::F32);
    let _ = layout.push(CHANNEL_HEAT, ScalarKind::F32);
    layout
}

/// A zeroed heat volume: material 0 everywhere, 0 K, no heat flow.
pub fn create_heat_volume(size: UVec3) -> Result<Volume, VoxelError> {
    Volume::create(size, &heat_volume_layout())
}

/// Bottom half (lower z) `solid`, top half `gas`.
pub fn fill_with_test_material(volume: &mut Volume, solid: u32, gas: u32) -> Result<(), VoxelError> {
    let size = volume.size();
    let layer = size.x as usize * size.y as usize;
    let material = volume.typed_mut::<u32>(CHANNEL_MATERIAL)?;
    for (z, slice) in (0..size.z).zip(material.chunks_mut(layer.max(1))) {
        let id = if z * 2 < size.z { solid } else { gas };
        slice.fill(id);
    }
    Ok(())
}

/// Set every voxel to `kelvin`.
pub fn fill_temperature(volume: &mut Volume, kelvin: f32) -> Result<(), VoxelError> {
    volume.typed_mut::<f32>(CHANNEL_TEMPERATURE)?.fill(kelvin);
    Ok(())
}

/// Pin the minimum corner to `hot` and the maximum corner to `cold` (Kelvin).
/// A no-op on an empty volume.
pub fn add_corner_heat_source_and_sink(
    volume: &mut Volume,
    hot: f32,
    cold: f32,
) -> Result<(), VoxelError> {
    let size = volume.size();
    if size.min_element() == 0 {
        return Ok(());
    }
    let source = volume.checked_index(0, 0, 0);
    let sink = volume.checked_index(size.x - 1, size.y - 1, size.z - 1);
    let temperature = volume.typed_mut::<f32>(CHANNEL_TEMPERATURE)?;
    if let Some(i) = source {
        temperature[i] = hot;
    }
    if let Some(i) = sink {
        temperature[i] = cold;
    }
    Ok(())
}
