use std::time::Instant;

use glam::UVec3;
use thiserror::Error;
use voxheat_core::constants::{DECIMETER, DEFAULT_TIME_STEP, ROOM_TEMPERATURE_K};
use voxheat_core::{Volume, VoxelError};
use voxheat_rules::defaults::default_catalog;
use voxheat_rules::loader::LoadError;
use voxheat_rules::validator::validate_materials;
use voxheat_rules::MaterialPropertyTable;
use voxheat_sim::heat::{max_stable_time_step, total_heat_energy};
use voxheat_sim::{available_algorithms, scene, HeatAlgorithm, SharedDevice};

/// Temperature of the hot corner voxel, in Kelvin.
const SOURCE_TEMPERATURE_K: f32 = 1000.0;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Voxel(#[from] VoxelError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Material validation failed with {0} errors")]
    Validation(usize),
    #[error("Material '{0}' missing from the default catalog")]
    MissingMaterial(&'static str),
}

/// Runner parameters, one per command-line flag.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub size: UVec3,
    pub ticks: u32,
    pub time_step: f32,
    pub edge_length: f32,
    pub cpu_only: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size: UVec3::new(32, 32, 32),
            ticks: 120,
            time_step: DEFAULT_TIME_STEP,
            edge_length: DECIMETER,
            cpu_only: false,
        }
    }
}

/// Timing data for a single algorithm run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl TimingSeries {
    /// Summarize per-tick durations in milliseconds. All zeros when there are none.
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (Some(&min_ms), Some(&max_ms)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };
        let n = sorted.len();
        Self {
            mean_ms: sorted.iter().sum::<f64>() / n as f64,
            // Both middle elements coincide for odd n.
            median_ms: (sorted[(n - 1) / 2] + sorted[n / 2]) / 2.0,
            p95_ms: nearest_rank(&sorted, 0.95),
            min_ms,
            max_ms,
        }
    }
}

/// Smallest sample with at least `fraction` of `sorted` at or below it.
fn nearest_rank(sorted: &[f64], fraction: f64) -> f64 {
    let rank = (fraction * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Result of running one algorithm over the scene.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlgorithmResult {
    pub algorithm: String,
    pub size: [u32; 3],
    pub tick_count: u32,
    pub energy_before: f64,
    pub energy_after: f64,
    pub timings: TimingSeries,
}

impl AlgorithmResult {
    pub fn voxel_count(&self) -> u64 {
        self.size.iter().map(|&n| n as u64).product()
    }

    /// Relative change in total heat energy over the run, in percent.
    pub fn energy_drift_pct(&self) -> f64 {
        if self.energy_before == 0.0 {
            return 0.0;
        }
        (self.energy_after - self.energy_before) / self.energy_before * 100.0
    }
}

/// Times every available heat algorithm on the standard stone-and-air scene.
pub struct HeatRunner {
    config: RunConfig,
    table: MaterialPropertyTable,
    stone: u32,
    air: u32,
}

impl HeatRunner {
    /// Load, validate and compile the built-in catalog for the configured edge length.
    pub fn new(config: RunConfig) -> Result<Self, RunnerError> {
        let catalog = default_catalog()?;
        if let Err(errors) = validate_materials(&catalog) {
            for e in &errors {
                log::error!("Material validation error: {e}");
            }
            return Err(RunnerError::Validation(errors.len()));
        }
        let table = MaterialPropertyTable::build(&catalog, config.edge_length)?;
        if let Some(limit) = max_stable_time_step(&table) {
            if config.time_step > limit {
                log::warn!(
                    "Time step {} s exceeds the stable limit of {} s for {} m voxels; temperatures will oscillate",
                    config.time_step,
                    limit,
                    config.edge_length
                );
            }
        }
        let stone = catalog
            .id_of("stone")
            .ok_or(RunnerError::MissingMaterial("stone"))? as u32;
        let air = catalog
            .id_of("air")
            .ok_or(RunnerError::MissingMaterial("air"))? as u32;
        Ok(Self {
            config,
            table,
            stone,
            air,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Bottom half stone, top half air, everything at room temperature, with a hot
    /// source at the origin corner and a 0 K sink at the far corner.
    pub fn build_scene(&self) -> Result<Volume, VoxelError> {
        let mut volume = scene::create_heat_volume(self.config.size)?;
        scene::fill_with_test_material(&mut volume, self.stone, self.air)?;
        scene::fill_temperature(&mut volume, ROOM_TEMPERATURE_K)?;
        scene::add_corner_heat_source_and_sink(&mut volume, SOURCE_TEMPERATURE_K, 0.0)?;
        Ok(volume)
    }

    /// Run every algorithm `device` allows, each on a fresh copy of the scene.
    pub fn run(&self, device: &SharedDevice) -> Result<Vec<AlgorithmResult>, RunnerError> {
        let initial = self.build_scene()?;
        let mut algorithms =
            available_algorithms(device, &initial, &self.table, self.config.time_step);

        let mut results = Vec::with_capacity(algorithms.len());
        for algorithm in algorithms.iter_mut() {
            let mut volume = initial.clone();
            results.push(self.run_algorithm(algorithm.as_mut(), &mut volume)?);
        }
        Ok(results)
    }

    fn run_algorithm(
        &self,
        algorithm: &mut dyn HeatAlgorithm,
        volume: &mut Volume,
    ) -> Result<AlgorithmResult, RunnerError> {
        let size = volume.size();
        log::info!(
            "Running '{}' on {}x{}x{} for {} ticks...",
            algorithm.name(),
            size.x,
            size.y,
            size.z,
            self.config.ticks
        );

        let energy_before = total_heat_energy(volume, &self.table)?;
        log::info!("  Heat energy before: {:.4} J", energy_before);

        let mut tick_times = Vec::with_capacity(self.config.ticks as usize);
        for _ in 0..self.config.ticks {
            let start = Instant::now();
            algorithm.run_once(volume)?;
            tick_times.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let energy_after = total_heat_energy(volume, &self.table)?;
        log::info!("  Heat energy after: {:.4} J", energy_after);

        let timings = TimingSeries::from_samples(&tick_times);
        log::info!(
            "  Done: mean={:.3}ms, p95={:.3}ms",
            timings.mean_ms,
            timings.p95_ms
        );

        Ok(AlgorithmResult {
            algorithm: algorithm.name().to_string(),
            size: size.to_array(),
            tick_count: self.config.ticks,
            energy_before,
            energy_after,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_summary() {
        let timings = TimingSeries::from_samples(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(timings.mean_ms, 2.5);
        assert_eq!(timings.median_ms, 2.5);
        assert_eq!(timings.min_ms, 1.0);
        assert_eq!(timings.max_ms, 4.0);
        assert_eq!(timings.p95_ms, 4.0);

        let odd = TimingSeries::from_samples(&[5.0, 1.0, 3.0]);
        assert_eq!(odd.median_ms, 3.0);
        assert_eq!(TimingSeries::from_samples(&[]), TimingSeries::default());
    }

    #[test]
    fn test_nearest_rank_percentile() {
        let samples: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(nearest_rank(&samples, 0.95), 19.0);
        assert_eq!(nearest_rank(&samples, 0.0), 1.0);
        assert_eq!(nearest_rank(&[7.0], 0.95), 7.0);
    }

    #[test]
    fn test_cpu_only_run_conserves_energy() {
        let config = RunConfig {
            size: UVec3::new(6, 4, 6),
            ticks: 10,
            time_step: 1e-3,
            ..Default::default()
        };
        let runner = HeatRunner::new(config).unwrap();
        let results = runner.run(&SharedDevice::disabled()).unwrap();
        assert_eq!(results.len(), 1);

        let cpu = &results[0];
        assert_eq!(cpu.algorithm, "cpu");
        assert_eq!(cpu.voxel_count(), 144);
        assert_eq!(cpu.tick_count, 10);
        assert!(cpu.energy_before > 0.0);
        assert!(cpu.energy_drift_pct().abs() < 1e-2);
    }

    #[test]
    fn test_scene_layout() {
        let runner = HeatRunner::new(RunConfig {
            size: UVec3::new(2, 2, 2),
            ..Default::default()
        })
        .unwrap();
        let volume = runner.build_scene().unwrap();
        let t = volume.typed::<f32>("temperature").unwrap();
        assert_eq!(t[0], SOURCE_TEMPERATURE_K);
        assert_eq!(t[7], 0.0);
        assert_eq!(t[3], ROOM_TEMPERATURE_K);
        let m = volume.typed::<u32>("material").unwrap();
        assert_eq!(m[0], runner.stone);
        assert_eq!(m[7], runner.air);
    }
}
