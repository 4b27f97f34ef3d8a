//! Host-side finite-difference heat diffusion.
//!
//! One simulation step is always [`calculate_heat`] followed by [`apply_heat`] with the
//! same time step. The first pass reads only `material`/`temperature` and writes only
//! `heat`, so every voxel sees the same frozen snapshot (a Jacobi update) and the result
//! does not depend on evaluation order. Never fuse the two passes per voxel.

use voxheat_core::constants::{CHANNEL_HEAT, CHANNEL_MATERIAL, CHANNEL_TEMPERATURE};
use voxheat_core::{ChannelData, Element, ScalarKind, Volume, VoxelError};
use voxheat_rules::MaterialPropertyTable;

/// Unsigned element types usable as material ids.
pub trait MaterialIndex: Element + Copy {
    fn id(self) -> usize;
}

impl MaterialIndex for u8 {
    fn id(self) -> usize {
        self as usize
    }
}

impl MaterialIndex for u16 {
    fn id(self) -> usize {
        self as usize
    }
}

impl MaterialIndex for u32 {
    fn id(self) -> usize {
        self as usize
    }
}

fn view<'a, T: Element>(data: &'a ChannelData, name: &str) -> Result<&'a [T], VoxelError> {
    let actual = data.kind();
    data.as_slice::<T>()
        .ok_or_else(|| VoxelError::ChannelTypeMismatch {
            channel: name.to_string(),
            expected: T::KIND,
            actual,
        })
}

fn view_mut<'a, T: Element>(
    data: &'a mut ChannelData,
    name: &str,
) -> Result<&'a mut [T], VoxelError> {
    let actual = data.kind();
    data.as_mut_slice::<T>()
        .ok_or_else(|| VoxelError::ChannelTypeMismatch {
            channel: name.to_string(),
            expected: T::KIND,
            actual,
        })
}

/// Every id in `material` must name a row of `table`.
fn check_material_ids(
    ids: impl Iterator<Item = usize>,
    table: &MaterialPropertyTable,
) -> Result<(), VoxelError> {
    let count = table.material_count();
    match ids.max() {
        Some(id) if id >= count => Err(VoxelError::UnknownMaterialId { id, count }),
        _ => Ok(()),
    }
}

/// Heat flow in Watts from voxel `from` into voxel `to`.
///
/// Zero if either side has no mass. Resistances add in series across the contact face.
#[inline]
fn voxel_flux(
    table: &MaterialPropertyTable,
    material_from: usize,
    temperature_from: f32,
    material_to: usize,
    temperature_to: f32,
) -> f32 {
    if table.mass(material_from) == 0.0 || table.mass(material_to) == 0.0 {
        return 0.0;
    }
    let resistance = table.thermal_resistance(material_from) + table.thermal_resistance(material_to);
    (temperature_from - temperature_to) / resistance
}

/// Write each voxel's net incoming heat flow from its six face neighbors into `heat`.
///
/// Neighbors outside the grid are skipped, so edge voxels receive fewer contributions.
/// A material id without a table row fails with `UnknownMaterialId` before anything is
/// written.
pub fn calculate_heat(volume: &mut Volume, table: &MaterialPropertyTable) -> Result<(), VoxelError> {
    match volume.channel(CHANNEL_MATERIAL)?.kind() {
        ScalarKind::U8 => calculate_heat_typed::<u8>(volume, table),
        ScalarKind::U16 => calculate_heat_typed::<u16>(volume, table),
        ScalarKind::U32 => calculate_heat_typed::<u32>(volume, table),
        actual => Err(VoxelError::ChannelTypeMismatch {
            channel: CHANNEL_MATERIAL.to_string(),
            expected: ScalarKind::U32,
            actual,
        }),
    }
}

/// [`calculate_heat`] for a known material element type.
pub fn calculate_heat_typed<M: MaterialIndex>(
    volume: &mut Volume,
    table: &MaterialPropertyTable,
) -> Result<(), VoxelError> {
    let size = volume.size();
    let [material, temperature, heat] =
        volume.channels_mut([CHANNEL_MATERIAL, CHANNEL_TEMPERATURE, CHANNEL_HEAT])?;
    let material = view::<M>(material, CHANNEL_MATERIAL)?;
    check_material_ids(material.iter().map(|m| m.id()), table)?;
    let temperature = view::<f32>(temperature, CHANNEL_TEMPERATURE)?;
    let heat = view_mut::<f32>(heat, CHANNEL_HEAT)?;

    let (size_x, size_y, size_z) = (size.x as usize, size.y as usize, size.z as usize);
    let stride_y = size_x;
    let stride_z = size_x * size_y;

    let mut index = 0;
    for z in 0..size_z {
        for y in 0..size_y {
            for x in 0..size_x {
                let material_to = material[index].id();
                let temperature_to = temperature[index];
                let flux_from = |from: usize| {
                    voxel_flux(
                        table,
                        material[from].id(),
                        temperature[from],
                        material_to,
                        temperature_to,
                    )
                };

                let mut total = 0.0;
                if x > 0 {
                    total += flux_from(index - 1);
                }
                if x + 1 < size_x {
                    total += flux_from(index + 1);
                }
                if y > 0 {
                    total += flux_from(index - stride_y);
                }
                if y + 1 < size_y {
                    total += flux_from(index + stride_y);
                }
                if z > 0 {
                    total += flux_from(index - stride_z);
                }
                if z + 1 < size_z {
                    total += flux_from(index + stride_z);
                }
                heat[index] = total;
                // Loops run z, y, x so the linear index simply advances.
                index += 1;
            }
        }
    }
    Ok(())
}

/// Convert accumulated heat flow into a temperature change over `time_step` seconds.
///
/// Voxels of zero-mass material are left untouched.
pub fn apply_heat(
    volume: &mut Volume,
    table: &MaterialPropertyTable,
    time_step: f32,
) -> Result<(), VoxelError> {
    match volume.channel(CHANNEL_MATERIAL)?.kind() {
        ScalarKind::U8 => apply_heat_typed::<u8>(volume, table, time_step),
        ScalarKind::U16 => apply_heat_typed::<u16>(volume, table, time_step),
        ScalarKind::U32 => apply_heat_typed::<u32>(volume, table, time_step),
        actual => Err(VoxelError::ChannelTypeMismatch {
            channel: CHANNEL_MATERIAL.to_string(),
            expected: ScalarKind::U32,
            actual,
        }),
    }
}

/// [`apply_heat`] for a known material element type.
pub fn apply_heat_typed<M: MaterialIndex>(
    volume: &mut Volume,
    table: &MaterialPropertyTable,
    time_step: f32,
) -> Result<(), VoxelError> {
    let [material, heat, temperature] =
        volume.channels_mut([CHANNEL_MATERIAL, CHANNEL_HEAT, CHANNEL_TEMPERATURE])?;
    let material = view::<M>(material, CHANNEL_MATERIAL)?;
    check_material_ids(material.iter().map(|m| m.id()), table)?;
    let heat = view::<f32>(heat, CHANNEL_HEAT)?;
    let temperature = view_mut::<f32>(temperature, CHANNEL_TEMPERATURE)?;

    for ((id, flow), temp) in material.iter().zip(heat).zip(temperature.iter_mut()) {
        let id = id.id();
        if table.mass(id) == 0.0 {
            continue;
        }
        // power * time = energy; energy / capacity = kelvin
        let energy = flow * time_step;
        *temp += energy / table.heat_capacity(id);
    }
    Ok(())
}

/// One full step: [`calculate_heat`] then [`apply_heat`].
pub fn step(
    volume: &mut Volume,
    table: &MaterialPropertyTable,
    time_step: f32,
) -> Result<(), VoxelError> {
    calculate_heat(volume, table)?;
    apply_heat(volume, table, time_step)
}

/// Total thermal energy `Σ capacity·T` in Joules over voxels with finite, non-zero capacity.
///
/// Diagnostic only. Constant (up to rounding) across steps of a closed system.
pub fn total_heat_energy(volume: &Volume, table: &MaterialPropertyTable) -> Result<f64, VoxelError> {
    let temperature = volume.typed::<f32>(CHANNEL_TEMPERATURE)?;
    let ids: Vec<usize> = match volume.channel(CHANNEL_MATERIAL)? {
        ChannelData::U8(ids) => ids.iter().map(|m| m.id()).collect(),
        ChannelData::U16(ids) => ids.iter().map(|m| m.id()).collect(),
        ChannelData::U32(ids) => ids.iter().map(|m| m.id()).collect(),
        other => {
            return Err(VoxelError::ChannelTypeMismatch {
                channel: CHANNEL_MATERIAL.to_string(),
                expected: ScalarKind::U32,
                actual: other.kind(),
            })
        }
    };

    check_material_ids(ids.iter().copied(), table)?;

    let mut total = 0.0f64;
    for (id, temp) in ids.into_iter().zip(temperature) {
        if table.mass(id) == 0.0 {
            continue;
        }
        let capacity = table.heat_capacity(id);
        if !capacity.is_finite() || capacity == 0.0 {
            continue;
        }
        total += capacity as f64 * *temp as f64;
    }
    Ok(total)
}

/// Largest time step for which no voxel can give away more heat in one step than it holds
/// relative to its neighbors. Beyond it temperatures oscillate and grow.
///
/// Conservative: uses the smallest capacity and resistance among participating materials.
/// `None` if no material has mass.
pub fn max_stable_time_step(table: &MaterialPropertyTable) -> Option<f32> {
    let participating = (0..table.material_count()).filter(|&id| table.mass(id) != 0.0);
    let min_capacity = participating
        .clone()
        .map(|id| table.heat_capacity(id))
        .reduce(f32::min)?;
    let min_resistance = participating
        .map(|id| table.thermal_resistance(id))
        .reduce(f32::min)?;
    // Six face neighbors, each coupled through at least 2 * min_resistance.
    Some(min_capacity * 2.0 * min_resistance / 6.0)
}
