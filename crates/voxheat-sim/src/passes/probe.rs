use std::sync::Arc;

use voxheat_core::{ChannelLayout, ScalarKind, VoxelError};

use crate::context::GpuContext;
use crate::pipeline::VolumePipeline;

const INDEX_WGSL: &str = include_str!("../../../../shaders/common/index.wgsl");
const INDEX_PROBE_WGSL: &str = include_str!("../../../../shaders/debug/index_probe.wgsl");

/// Channel written by the index probe kernel.
pub const PROBE_CHANNEL: &str = "probe";

/// Layout of a volume the probe can be dispatched over.
pub fn probe_layout() -> Result<ChannelLayout, VoxelError> {
    ChannelLayout::from_pairs([(PROBE_CHANNEL, ScalarKind::U32)])
}

/// Debug kernel writing each voxel's device-side linear index into `probe`.
pub fn create_index_probe_pipeline(ctx: &Arc<GpuContext>) -> Result<VolumePipeline, VoxelError> {
    let body = format!("{INDEX_WGSL}\n{INDEX_PROBE_WGSL}");
    VolumePipeline::create(ctx, "index-probe", probe_layout()?, &body)
}
