use std::fmt::Write as _;
use std::sync::Arc;

use glam::UVec3;
use voxheat_core::{ChannelLayout, ScalarKind, VoxelError};

use crate::context::GpuContext;
use crate::gpu_volume::GpuVolume;

/// Anything that can supply a device buffer for a binding name.
pub trait BufferSource {
    fn find_buffer(&self, name: &str) -> Option<&wgpu::Buffer>;
}

impl BufferSource for GpuVolume {
    fn find_buffer(&self, name: &str) -> Option<&wgpu::Buffer> {
        self.buffer(name)
    }
}

/// Several volumes searched in order; the first holding the name wins.
impl BufferSource for [&GpuVolume] {
    fn find_buffer(&self, name: &str) -> Option<&wgpu::Buffer> {
        self.iter().find_map(|volume| volume.buffer(name))
    }
}

impl BufferSource for [(&str, &wgpu::Buffer)] {
    fn find_buffer(&self, name: &str) -> Option<&wgpu::Buffer> {
        self.iter()
            .find(|(binding, _)| *binding == name)
            .map(|(_, buffer)| *buffer)
    }
}

/// Concatenate binding groups in order, rejecting any name declared twice.
pub fn merge_bindings(groups: &[&ChannelLayout]) -> Result<ChannelLayout, VoxelError> {
    let mut merged = ChannelLayout::new();
    for group in groups {
        for (name, kind) in group.iter() {
            merged
                .push(name, kind)
                .map_err(|_| VoxelError::DuplicateBindingName(name.to_string()))?;
        }
    }
    Ok(merged)
}

/// WGSL storage declarations for `bindings`, one per entry, binding index = position.
///
/// ```text
/// @group(0) @binding(0)
/// var<storage, read_write> temperature: array<f32>;
/// ```
pub fn binding_declarations(bindings: &ChannelLayout) -> Result<String, VoxelError> {
    let mut source = String::new();
    if bindings.iter().any(|(_, kind)| kind == ScalarKind::F16) {
        source.push_str("enable f16;\n\n");
    }
    for (index, (name, kind)) in bindings.iter().enumerate() {
        let device_type = kind
            .describe()
            .device_type
            .ok_or_else(|| VoxelError::UnsupportedChannelType {
                channel: name.to_string(),
                kind,
                side: "device",
            })?;
        let _ = writeln!(
            source,
            "@group(0) @binding({index})\nvar<storage, read_write> {name}: array<{device_type}>;"
        );
    }
    Ok(source)
}

/// A compute kernel run once per voxel, with one storage binding per declared channel.
///
/// The kernel body is appended after the generated declarations and must define
/// `main` with `@workgroup_size(1)`; workgroup `(x, y, z)` handles voxel `(x, y, z)`.
pub struct VolumePipeline {
    ctx: Arc<GpuContext>,
    label: String,
    bindings: ChannelLayout,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl VolumePipeline {
    /// Compile `kernel_body` against storage declarations generated from `bindings`.
    pub fn create(
        ctx: &Arc<GpuContext>,
        label: &str,
        bindings: ChannelLayout,
        kernel_body: &str,
    ) -> Result<Self, VoxelError> {
        let declarations = binding_declarations(&bindings)?;
        let shader_source = format!("{declarations}\n{kernel_body}");
        let device = &ctx.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label}-shader")),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..bindings.len() as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}-bind-group-layout")),
            entries: &entries,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}-pipeline-layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&format!("{label}-pipeline")),
            layout: Some(&layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Kernel '{}' failed to compile: {}", label, error);
            return Err(VoxelError::ShaderCompilationFailed(format!("{label}: {error}")));
        }

        log::debug!("Created pipeline '{}' with {} bindings", label, bindings.len());
        Ok(Self {
            ctx: Arc::clone(ctx),
            label: label.to_string(),
            bindings,
            bind_group_layout,
            pipeline,
        })
    }

    /// [`VolumePipeline::create`] with bindings declared as input and output groups.
    /// Inputs come first in binding order.
    pub fn create_with_roles(
        ctx: &Arc<GpuContext>,
        label: &str,
        inputs: &ChannelLayout,
        outputs: &ChannelLayout,
        kernel_body: &str,
    ) -> Result<Self, VoxelError> {
        let bindings = merge_bindings(&[inputs, outputs])?;
        Self::create(ctx, label, bindings, kernel_body)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bindings(&self) -> &ChannelLayout {
        &self.bindings
    }

    /// Record one dispatch of `size` workgroups into `encoder`.
    ///
    /// Every declared binding must resolve in `sources`. Nothing is recorded on error.
    pub fn encode_pass<S: BufferSource + ?Sized>(
        &self,
        sources: &S,
        size: UVec3,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), VoxelError> {
        let limit = self.ctx.max_workgroups_per_dimension();
        let requested = size.max_element();
        if requested > limit {
            return Err(VoxelError::DispatchTooLarge { requested, limit });
        }

        let buffers = self
            .bindings
            .names()
            .map(|name| {
                sources
                    .find_buffer(name)
                    .ok_or_else(|| VoxelError::MissingBinding(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}-bind-group", self.label)),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label.as_str()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(size.x, size.y, size.z);
        Ok(())
    }

    /// Dispatch over `volume`'s own grid, binding its channels by name.
    pub fn encode_volume_pass(
        &self,
        volume: &GpuVolume,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), VoxelError> {
        self.encode_pass(volume, volume.size(), encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(pairs: &[(&str, ScalarKind)]) -> ChannelLayout {
        ChannelLayout::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_merge_preserves_order() {
        let inputs = layout(&[("material", ScalarKind::U32), ("temperature", ScalarKind::F32)]);
        let outputs = layout(&[("heat", ScalarKind::F32)]);
        let merged = merge_bindings(&[&inputs, &outputs]).unwrap();
        assert_eq!(
            merged.names().collect::<Vec<_>>(),
            vec!["material", "temperature", "heat"]
        );
    }

    #[test]
    fn test_duplicate_binding_across_groups() {
        let inputs = layout(&[("a", ScalarKind::F32), ("b", ScalarKind::F32)]);
        let outputs = layout(&[("a", ScalarKind::F32)]);
        assert_eq!(
            merge_bindings(&[&inputs, &outputs]),
            Err(VoxelError::DuplicateBindingName("a".into()))
        );
    }

    #[test]
    fn test_declarations_follow_binding_order() {
        let bindings = layout(&[("material", ScalarKind::U32), ("heat", ScalarKind::F32)]);
        let source = binding_declarations(&bindings).unwrap();
        assert_eq!(
            source,
            "@group(0) @binding(0)\nvar<storage, read_write> material: array<u32>;\n\
             @group(0) @binding(1)\nvar<storage, read_write> heat: array<f32>;\n"
        );
    }

    #[test]
    fn test_half_precision_enables_extension() {
        let bindings = layout(&[("h", ScalarKind::F16)]);
        let source = binding_declarations(&bindings).unwrap();
        assert!(source.starts_with("enable f16;"));
        assert!(source.contains("var<storage, read_write> h: array<f16>;"));
    }

    #[test]
    fn test_types_without_device_form_are_rejected() {
        for kind in [ScalarKind::U8, ScalarKind::U16, ScalarKind::I8, ScalarKind::F64] {
            let bindings = layout(&[("x", kind)]);
            assert_eq!(
                binding_declarations(&bindings),
                Err(VoxelError::UnsupportedChannelType {
                    channel: "x".into(),
                    kind,
                    side: "device",
                })
            );
        }
    }

    #[test]
    fn test_named_buffer_source_misses_unknown_names() {
        let sources: [(&str, &wgpu::Buffer); 0] = [];
        assert!(sources[..].find_buffer("heat").is_none());
    }
}
