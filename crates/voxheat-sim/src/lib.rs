pub mod algorithm;
pub mod context;
pub mod gpu_volume;
pub mod heat;
pub mod passes;
pub mod pipeline;
pub mod scene;

#[cfg(test)]
mod test_harness;

pub use algorithm::{available_algorithms, CpuHeat, GpuHeat, HeatAlgorithm};
pub use context::{GpuContext, SharedDevice};
pub use gpu_volume::{GpuVolume, VolumeAccess};
pub use passes::heat::GpuHeatSolver;
pub use pipeline::{BufferSource, VolumePipeline};
