use std::sync::Arc;

use glam::UVec3;
use voxheat_core::constants::{
    CHANNEL_HEAT, CHANNEL_LOOKUP, CHANNEL_MATERIAL, CHANNEL_TEMPERATURE, MATERIAL_PROPERTY_COUNT,
    PROPERTY_HEAT_CAPACITY, PROPERTY_MASS, PROPERTY_THERMAL_RESISTANCE,
};
use voxheat_core::{ChannelLayout, ScalarKind, Volume, VoxelError};
use voxheat_rules::MaterialPropertyTable;

use crate::context::GpuContext;
use crate::gpu_volume::{GpuVolume, VolumeAccess};
use crate::pipeline::VolumePipeline;
use crate::scene::heat_volume_layout;

const INDEX_WGSL: &str = include_str!("../../../../shaders/common/index.wgsl");
const PROPERTIES_WGSL: &str = include_str!("../../../../shaders/heat/properties.wgsl");
const CALCULATE_HEAT_WGSL: &str = include_str!("../../../../shaders/heat/calculate_heat.wgsl");
const APPLY_HEAT_WGSL: &str = include_str!("../../../../shaders/heat/apply_heat.wgsl");

/// WGSL constants injected ahead of both heat kernels.
pub fn constants_preamble(time_step: f32) -> String {
    format!(
        "const MATERIAL_PROPERTY_COUNT: u32 = {}u;\n\
         const PROPERTY_MASS: u32 = {}u;\n\
         const PROPERTY_THERMAL_RESISTANCE: u32 = {}u;\n\
         const PROPERTY_HEAT_CAPACITY: u32 = {}u;\n\
         const TIME_STEP: f32 = {:?};\n",
        MATERIAL_PROPERTY_COUNT,
        PROPERTY_MASS,
        PROPERTY_THERMAL_RESISTANCE,
        PROPERTY_HEAT_CAPACITY,
        time_step,
    )
}

fn compose(time_step: f32, kernel: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        constants_preamble(time_step),
        INDEX_WGSL,
        PROPERTIES_WGSL,
        kernel
    )
}

pub fn calculate_heat_source(time_step: f32) -> String {
    compose(time_step, CALCULATE_HEAT_WGSL)
}

pub fn apply_heat_source(time_step: f32) -> String {
    compose(time_step, APPLY_HEAT_WGSL)
}

fn layout(pairs: &[(&str, ScalarKind)]) -> Result<ChannelLayout, VoxelError> {
    ChannelLayout::from_pairs(pairs.iter().copied())
}

/// Read `material`, `temperature`, `lookup`; write `heat`.
pub fn create_calculate_heat_pipeline(
    ctx: &Arc<GpuContext>,
    time_step: f32,
) -> Result<VolumePipeline, VoxelError> {
    let inputs = layout(&[
        (CHANNEL_MATERIAL, ScalarKind::U32),
        (CHANNEL_TEMPERATURE, ScalarKind::F32),
        (CHANNEL_LOOKUP, ScalarKind::F32),
    ])?;
    let outputs = layout(&[(CHANNEL_HEAT, ScalarKind::F32)])?;
    VolumePipeline::create_with_roles(
        ctx,
        "calculate-heat",
        &inputs,
        &outputs,
        &calculate_heat_source(time_step),
    )
}

/// Read `material`, `heat`, `lookup`; write `temperature`.
pub fn create_apply_heat_pipeline(
    ctx: &Arc<GpuContext>,
    time_step: f32,
) -> Result<VolumePipeline, VoxelError> {
    let inputs = layout(&[
        (CHANNEL_MATERIAL, ScalarKind::U32),
        (CHANNEL_HEAT, ScalarKind::F32),
        (CHANNEL_LOOKUP, ScalarKind::F32),
    ])?;
    let outputs = layout(&[(CHANNEL_TEMPERATURE, ScalarKind::F32)])?;
    VolumePipeline::create_with_roles(
        ctx,
        "apply-heat",
        &inputs,
        &outputs,
        &apply_heat_source(time_step),
    )
}

/// Device-resident heat simulation of one volume.
///
/// Holds the volume's `material`/`temperature`/`heat` channels and the material table
/// on the device. The device copy is authoritative between [`GpuHeatSolver::upload`]
/// and [`GpuHeatSolver::download`].
pub struct GpuHeatSolver {
    ctx: Arc<GpuContext>,
    size: UVec3,
    volume: GpuVolume,
    lookup: GpuVolume,
    calculate: VolumePipeline,
    apply: VolumePipeline,
    time_step: f32,
}

impl GpuHeatSolver {
    /// Upload `host` and `table` and compile both kernels for `time_step`.
    ///
    /// The host material channel must be `u32`.
    pub fn new(
        ctx: &Arc<GpuContext>,
        host: &Volume,
        table: &MaterialPropertyTable,
        time_step: f32,
    ) -> Result<Self, VoxelError> {
        let material = host.channel(CHANNEL_MATERIAL)?.kind();
        if material != ScalarKind::U32 {
            return Err(VoxelError::ChannelTypeMismatch {
                channel: CHANNEL_MATERIAL.to_string(),
                expected: ScalarKind::U32,
                actual: material,
            });
        }

        let size = host.size();
        let volume = GpuVolume::create(ctx, size, &heat_volume_layout(), VolumeAccess::READ_WRITE)?;
        volume.write_from_cpu(host)?;
        let lookup = GpuVolume::create_from_host(ctx, table.volume(), VolumeAccess::default())?;

        let calculate = create_calculate_heat_pipeline(ctx, time_step)?;
        let apply = create_apply_heat_pipeline(ctx, time_step)?;

        log::info!(
            "GPU heat solver ready: {}x{}x{} voxels, {} materials, dt {}",
            size.x,
            size.y,
            size.z,
            table.material_count(),
            time_step
        );
        Ok(Self {
            ctx: Arc::clone(ctx),
            size,
            volume,
            lookup,
            calculate,
            apply,
            time_step,
        })
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Record one full step (both passes) into `encoder`.
    pub fn encode_step(&self, encoder: &mut wgpu::CommandEncoder) -> Result<(), VoxelError> {
        let sources = [&self.volume, &self.lookup];
        self.calculate.encode_pass(&sources[..], self.size, encoder)?;
        self.apply.encode_pass(&sources[..], self.size, encoder)
    }

    /// Run `iterations` steps in a single submission and wait for completion.
    pub fn step(&self, iterations: u32) -> Result<(), VoxelError> {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("heat-step-encoder"),
            });
        for _ in 0..iterations {
            self.encode_step(&mut encoder)?;
        }
        self.ctx.submit_and_wait(encoder)
    }

    /// Replace the device state with `host`'s heat channels.
    pub fn upload(&self, host: &Volume) -> Result<(), VoxelError> {
        self.volume.write_from_cpu(host)
    }

    /// Copy the device state into `host`'s heat channels.
    pub fn download(&self, host: &mut Volume) -> Result<(), VoxelError> {
        self.volume.copy_into(host)
    }

    pub fn destroy(self) {
        self.volume.destroy();
        self.lookup.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_matches_host_constants() {
        let preamble = constants_preamble(0.5);
        assert!(preamble.contains("const MATERIAL_PROPERTY_COUNT: u32 = 3u;"));
        assert!(preamble.contains("const PROPERTY_MASS: u32 = 0u;"));
        assert!(preamble.contains("const PROPERTY_THERMAL_RESISTANCE: u32 = 1u;"));
        assert!(preamble.contains("const PROPERTY_HEAT_CAPACITY: u32 = 2u;"));
        assert!(preamble.contains("const TIME_STEP: f32 = 0.5;"));
    }

    #[test]
    fn test_time_step_is_a_float_literal() {
        assert!(constants_preamble(1.0).contains("TIME_STEP: f32 = 1.0;"));
        let source = calculate_heat_source(1.0 / 30.0);
        assert!(source.contains("TIME_STEP: f32 = 0.033333335;"));
    }

    #[test]
    fn test_kernel_sources_are_composed() {
        for source in [calculate_heat_source(0.1), apply_heat_source(0.1)] {
            assert!(source.contains("fn voxel_index"));
            assert!(source.contains("fn material_property"));
            assert!(source.contains("fn main"));
        }
        assert!(calculate_heat_source(0.1).contains("heat[index] = total;"));
        assert!(apply_heat_source(0.1).contains("temperature[index] +="));
    }
}
