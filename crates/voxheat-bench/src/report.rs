use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::runner::{AlgorithmResult, RunConfig};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot access report '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ReportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Everything one runner invocation produced, as written to `--output`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunReport {
    pub label: String,
    pub time_step: f32,
    pub edge_length: f32,
    pub results: Vec<AlgorithmResult>,
}

impl RunReport {
    pub fn new(label: String, config: &RunConfig, results: Vec<AlgorithmResult>) -> Self {
        Self {
            label,
            time_step: config.time_step,
            edge_length: config.edge_length,
            results,
        }
    }
}

/// Read a report written by [`save_report`].
pub fn load_report(path: &Path) -> Result<RunReport, ReportError> {
    let file = File::open(path).map_err(|e| ReportError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ReportError::json(path, e))
}

/// Write `report` as pretty JSON, creating missing parent directories.
pub fn save_report(path: &Path, report: &RunReport) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ReportError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| ReportError::json(path, e))?;
    writer.flush().map_err(|e| ReportError::io(path, e))
}

/// Format results as a markdown summary table.
pub fn format_markdown(results: &[AlgorithmResult]) -> String {
    let mut out = String::new();
    out.push_str("| Algorithm | Voxels | Ticks | Mean (ms) | Median (ms) | P95 (ms) | Min (ms) | Max (ms) | Energy before (J) | Energy after (J) | Drift (%) |\n");
    out.push_str("|-----------|--------|-------|-----------|-------------|----------|----------|----------|-------------------|------------------|-----------|\n");

    for r in results {
        out.push_str(&format!(
            "| {} | {} | {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} | {:.4} | {:.4} | {:.4} |\n",
            r.algorithm,
            r.voxel_count(),
            r.tick_count,
            r.timings.mean_ms,
            r.timings.median_ms,
            r.timings.p95_ms,
            r.timings.min_ms,
            r.timings.max_ms,
            r.energy_before,
            r.energy_after,
            r.energy_drift_pct(),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TimingSeries;

    fn result(algorithm: &str, before: f64, after: f64) -> AlgorithmResult {
        AlgorithmResult {
            algorithm: algorithm.into(),
            size: [4, 2, 3],
            tick_count: 5,
            energy_before: before,
            energy_after: after,
            timings: TimingSeries::from_samples(&[1.0, 2.0, 3.0]),
        }
    }

    #[test]
    fn test_markdown_has_one_row_per_result() {
        let table = format_markdown(&[result("cpu", 10.0, 10.0), result("gpu", 10.0, 9.0)]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("| cpu | 24 | 5 | 2.000 |"));
        assert!(lines[3].ends_with("| -10.0000 |"));
    }

    #[test]
    fn test_report_survives_save_and_load() {
        let dir = std::env::temp_dir().join(format!("voxheat-report-{}", std::process::id()));
        let path = dir.join("nested").join("report.json");
        let report = RunReport::new(
            "test".into(),
            &RunConfig::default(),
            vec![result("cpu", 1.5, 1.5)],
        );
        save_report(&path, &report).unwrap();
        assert_eq!(load_report(&path).unwrap(), report);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_report_is_io_error() {
        assert!(matches!(
            load_report(Path::new("/definitely/not/here.json")),
            Err(ReportError::Io { .. })
        ));
    }

    #[test]
    fn test_garbled_report_is_json_error() {
        let path = std::env::temp_dir().join(format!("voxheat-garbled-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_report(&path), Err(ReportError::Json { .. })));
        let _ = std::fs::remove_file(path);
    }
}
