use voxheat_core::{Volume, VoxelError};
use voxheat_rules::MaterialPropertyTable;

use crate::context::SharedDevice;
use crate::heat;
use crate::passes::heat::GpuHeatSolver;

/// A heat solver that can advance a host volume one step at a time.
pub trait HeatAlgorithm {
    fn name(&self) -> &'static str;

    /// Advance `volume` by one step. On return `volume` holds the new state.
    fn run_once(&mut self, volume: &mut Volume) -> Result<(), VoxelError>;
}

/// Host solver.
pub struct CpuHeat {
    table: MaterialPropertyTable,
    time_step: f32,
}

impl CpuHeat {
    pub fn new(table: MaterialPropertyTable, time_step: f32) -> Self {
        Self { table, time_step }
    }
}

impl HeatAlgorithm for CpuHeat {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn run_once(&mut self, volume: &mut Volume) -> Result<(), VoxelError> {
        heat::step(volume, &self.table, self.time_step)
    }
}

/// Device solver. State stays on the device between runs and is copied back after each.
///
/// Edits made to the host volume between runs are ignored unless [`GpuHeat::resync`]
/// is called.
pub struct GpuHeat {
    solver: GpuHeatSolver,
}

impl GpuHeat {
    pub fn new(solver: GpuHeatSolver) -> Self {
        Self { solver }
    }

    /// Push the host volume's current state to the device.
    pub fn resync(&mut self, volume: &Volume) -> Result<(), VoxelError> {
        self.solver.upload(volume)
    }
}

impl HeatAlgorithm for GpuHeat {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn run_once(&mut self, volume: &mut Volume) -> Result<(), VoxelError> {
        self.solver.step(1)?;
        self.solver.download(volume)
    }
}

/// The host solver, plus the device solver when `device` can provide one.
///
/// Device failures are logged and fall back to host-only.
pub fn available_algorithms(
    device: &SharedDevice,
    volume: &Volume,
    table: &MaterialPropertyTable,
    time_step: f32,
) -> Vec<Box<dyn HeatAlgorithm>> {
    let mut algorithms: Vec<Box<dyn HeatAlgorithm>> =
        vec![Box::new(CpuHeat::new(table.clone(), time_step))];
    if !device.is_enabled() {
        return algorithms;
    }
    let gpu = device
        .acquire_blocking()
        .and_then(|ctx| GpuHeatSolver::new(&ctx, volume, table, time_step));
    match gpu {
        Ok(solver) => algorithms.push(Box::new(GpuHeat::new(solver))),
        Err(e) => log::warn!("GPU heat solver unavailable, running host only: {}", e),
    }
    algorithms
}
