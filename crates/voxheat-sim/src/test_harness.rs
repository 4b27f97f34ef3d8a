/// Device-backed tests for volumes, pipelines and the heat kernels.
///
/// Gated behind `#[cfg(feature = "gpu_tests")]` since they need an adapter. Each test
/// skips itself when none can be acquired.

#[cfg(all(test, feature = "gpu_tests"))]
mod tests {
    use std::sync::Arc;

    use glam::UVec3;
    use voxheat_core::constants::{CHANNEL_HEAT, CHANNEL_MATERIAL, CHANNEL_TEMPERATURE};
    use voxheat_core::material::MaterialRecord;
    use voxheat_core::{ChannelLayout, ScalarKind, Volume, VoxelError};
    use voxheat_rules::MaterialPropertyTable;

    use crate::context::GpuContext;
    use crate::gpu_volume::{GpuVolume, VolumeAccess};
    use crate::heat;
    use crate::passes::heat::GpuHeatSolver;
    use crate::passes::probe::{create_index_probe_pipeline, probe_layout, PROBE_CHANNEL};
    use crate::pipeline::VolumePipeline;
    use crate::scene;

    fn context() -> Option<Arc<GpuContext>> {
        match GpuContext::acquire_blocking() {
            Ok(ctx) => Some(Arc::new(ctx)),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    fn mixed_layout() -> ChannelLayout {
        ChannelLayout::from_pairs([
            (CHANNEL_MATERIAL, ScalarKind::U32),
            (CHANNEL_TEMPERATURE, ScalarKind::F32),
            ("flags", ScalarKind::U8),
        ])
        .unwrap()
    }

    fn patterned(size: UVec3) -> Volume {
        let mut volume = Volume::create(size, &mixed_layout()).unwrap();
        for i in 0..volume.voxel_count() {
            volume.typed_mut::<u32>(CHANNEL_MATERIAL).unwrap()[i] = i as u32 * 3;
            volume.typed_mut::<f32>(CHANNEL_TEMPERATURE).unwrap()[i] = 0.5 * i as f32;
            volume.typed_mut::<u8>("flags").unwrap()[i] = (i % 251) as u8;
        }
        volume
    }

    #[test]
    fn test_round_trip_through_device() {
        let Some(ctx) = context() else { return };
        let host = patterned(UVec3::new(4, 1, 4));
        let gpu = GpuVolume::create_from_host(&ctx, &host, VolumeAccess::READ_WRITE).unwrap();
        assert_eq!(gpu.copy_to_cpu().unwrap(), host);
        gpu.destroy();
    }

    #[test]
    fn test_sub_word_channel_round_trip() {
        let Some(ctx) = context() else { return };
        // 5 one-byte elements, padded to 8 on the device.
        let host = patterned(UVec3::new(5, 1, 1));
        let gpu = GpuVolume::create(&ctx, host.size(), &host.layout(), VolumeAccess::READ_WRITE)
            .unwrap();
        gpu.write_from_cpu(&host).unwrap();
        assert_eq!(gpu.copy_to_cpu().unwrap(), host);
    }

    #[test]
    fn test_write_requires_copy_dst() {
        let Some(ctx) = context() else { return };
        let host = patterned(UVec3::new(2, 2, 2));
        let read_only = VolumeAccess {
            read: true,
            ..Default::default()
        };
        let gpu = GpuVolume::create_from_host(&ctx, &host, read_only).unwrap();
        assert!(matches!(
            gpu.write_from_cpu(&host),
            Err(VoxelError::MissingUsage { ref channel, usage: "COPY_DST" }) if channel == "<volume>"
        ));
        assert_eq!(gpu.copy_to_cpu().unwrap(), host);
    }

    #[test]
    fn test_volume_beyond_buffer_limit_is_rejected() {
        let Some(ctx) = context() else { return };
        let limit = crate::gpu_volume::buffer_limit(&ctx.device.limits());
        // One f32 channel, one layer of 1024x1024 voxels per 4 MiB.
        let layers = (limit / (4 * 1024 * 1024) + 1) as u32;
        let size = UVec3::new(1024, 1024, layers);
        let layout = ChannelLayout::from_pairs([(CHANNEL_TEMPERATURE, ScalarKind::F32)]).unwrap();
        for access in [
            VolumeAccess::READ_WRITE,
            VolumeAccess {
                mapped_at_creation: true,
                ..VolumeAccess::READ_WRITE
            },
        ] {
            assert!(matches!(
                GpuVolume::create(&ctx, size, &layout, access),
                Err(VoxelError::BufferTooLarge { .. })
            ));
        }
    }

    #[test]
    fn test_readback_rejects_mismatched_host() {
        let Some(ctx) = context() else { return };
        let gpu = GpuVolume::create(&ctx, UVec3::new(2, 2, 2), &mixed_layout(), VolumeAccess::READ_WRITE)
            .unwrap();
        let mut wrong_size = Volume::create(UVec3::new(2, 2, 1), &mixed_layout()).unwrap();
        assert!(matches!(
            gpu.copy_into(&mut wrong_size),
            Err(VoxelError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_device_index_law_matches_host() {
        let Some(ctx) = context() else { return };
        let size = UVec3::new(3, 2, 4);
        let probe = create_index_probe_pipeline(&ctx).unwrap();
        let gpu = GpuVolume::create(&ctx, size, &probe_layout().unwrap(), VolumeAccess::READ_WRITE)
            .unwrap();

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        probe.encode_volume_pass(&gpu, &mut encoder).unwrap();
        ctx.submit_and_wait(encoder).unwrap();

        let host = gpu.copy_to_cpu().unwrap();
        let written = host.typed::<u32>(PROBE_CHANNEL).unwrap();
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let expected = host.index(x as i64, y as i64, z as i64);
                    let i = expected as usize;
                    assert_eq!(written[i] as i64, expected);
                }
            }
        }
    }

    #[test]
    fn test_missing_binding_is_reported() {
        let Some(ctx) = context() else { return };
        let probe = create_index_probe_pipeline(&ctx).unwrap();
        let other = GpuVolume::create(&ctx, UVec3::ONE, &mixed_layout(), VolumeAccess::default())
            .unwrap();
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        assert_eq!(
            probe.encode_volume_pass(&other, &mut encoder),
            Err(VoxelError::MissingBinding(PROBE_CHANNEL.into()))
        );
    }

    #[test]
    fn test_dispatch_limit_is_enforced() {
        let Some(ctx) = context() else { return };
        let probe = create_index_probe_pipeline(&ctx).unwrap();
        let gpu = GpuVolume::create(&ctx, UVec3::ONE, &probe_layout().unwrap(), VolumeAccess::default())
            .unwrap();
        let limit = ctx.max_workgroups_per_dimension();
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        assert_eq!(
            probe.encode_pass(&gpu, UVec3::new(1, limit + 1, 1), &mut encoder),
            Err(VoxelError::DispatchTooLarge {
                requested: limit + 1,
                limit
            })
        );
    }

    #[test]
    fn test_invalid_kernel_fails_to_compile() {
        let Some(ctx) = context() else { return };
        let result = VolumePipeline::create(
            &ctx,
            "broken",
            probe_layout().unwrap(),
            "@compute @workgroup_size(1) fn main() { probe[0] = undefined_name; }",
        );
        assert!(matches!(result, Err(VoxelError::ShaderCompilationFailed(_))));
    }

    #[test]
    fn test_gpu_heat_matches_cpu() {
        let Some(ctx) = context() else { return };
        let table = MaterialPropertyTable::from_records(&[
            MaterialRecord::NON_PARTICIPATING,
            MaterialRecord::new(1.0, 1.0, 1.0),
        ])
        .unwrap();
        let dt = 1.0 / 30.0;
        let mut cpu = scene::create_heat_volume(UVec3::new(5, 4, 6)).unwrap();
        scene::fill_with_test_material(&mut cpu, 1, 0).unwrap();
        scene::fill_temperature(&mut cpu, 293.15).unwrap();
        scene::add_corner_heat_source_and_sink(&mut cpu, 1000.0, 0.0).unwrap();
        let mut gpu = cpu.clone();

        let solver = GpuHeatSolver::new(&ctx, &gpu, &table, dt).unwrap();
        let steps = 20;
        solver.step(steps).unwrap();
        solver.download(&mut gpu).unwrap();
        for _ in 0..steps {
            heat::step(&mut cpu, &table, dt).unwrap();
        }

        for channel in [CHANNEL_TEMPERATURE, CHANNEL_HEAT] {
            let expected = cpu.typed::<f32>(channel).unwrap();
            let actual = gpu.typed::<f32>(channel).unwrap();
            for (i, (a, b)) in actual.iter().zip(expected).enumerate() {
                assert!(
                    (a - b).abs() <= 1e-3 * b.abs().max(1.0),
                    "{channel}[{i}]: gpu {a} vs cpu {b}"
                );
            }
        }
        assert_eq!(
            gpu.typed::<u32>(CHANNEL_MATERIAL).unwrap(),
            cpu.typed::<u32>(CHANNEL_MATERIAL).unwrap()
        );
    }

    #[test]
    fn test_gpu_heat_single_step_scenario() {
        let Some(ctx) = context() else { return };
        let table = MaterialPropertyTable::from_records(&[MaterialRecord::new(1.0, 1.0, 1.0)]).unwrap();
        let mut volume = scene::create_heat_volume(UVec3::new(4, 1, 4)).unwrap();
        volume.typed_mut::<f32>(CHANNEL_TEMPERATURE).unwrap()[0] = 1000.0;

        let solver = GpuHeatSolver::new(&ctx, &volume, &table, 1.0 / 30.0).unwrap();
        solver.step(1).unwrap();
        solver.download(&mut volume).unwrap();

        let t = volume.typed::<f32>(CHANNEL_TEMPERATURE).unwrap();
        assert!(t[0] < 1000.0);
        assert!(t[1] > 0.0);
        assert!(t[4] > 0.0);
        assert_eq!(t[2], 0.0);
        assert_eq!(t[5], 0.0);
        assert_eq!(t[8], 0.0);
    }

    #[test]
    fn test_gpu_solver_requires_u32_material() {
        let Some(ctx) = context() else { return };
        let table = MaterialPropertyTable::from_records(&[MaterialRecord::new(1.0, 1.0, 1.0)]).unwrap();
        let layout = ChannelLayout::from_pairs([
            (CHANNEL_MATERIAL, ScalarKind::U8),
            (CHANNEL_TEMPERATURE, ScalarKind::F32),
            (CHANNEL_HEAT, ScalarKind::F32),
        ])
        .unwrap();
        let volume = Volume::create(UVec3::ONE, &layout).unwrap();
        assert!(matches!(
            GpuHeatSolver::new(&ctx, &volume, &table, 0.1),
            Err(VoxelError::ChannelTypeMismatch { .. })
        ));
    }
}
