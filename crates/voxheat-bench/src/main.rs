use std::path::PathBuf;
use std::process;

use glam::UVec3;
use voxheat_bench::report;
use voxheat_bench::runner::{HeatRunner, RunConfig};
use voxheat_sim::SharedDevice;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = RunConfig::default();
    let mut output_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" => {
                let mut axes = [0u32; 3];
                for axis in axes.iter_mut() {
                    i += 1;
                    *axis = value(&args, i, "--size").parse().expect("invalid --size value");
                }
                config.size = UVec3::from_array(axes);
            }
            "--ticks" => {
                i += 1;
                config.ticks = value(&args, i, "--ticks").parse().expect("invalid --ticks value");
            }
            "--dt" => {
                i += 1;
                config.time_step = value(&args, i, "--dt").parse().expect("invalid --dt value");
            }
            "--edge" => {
                i += 1;
                config.edge_length = value(&args, i, "--edge").parse().expect("invalid --edge value");
            }
            "--cpu-only" => {
                config.cpu_only = true;
            }
            "--output" => {
                i += 1;
                output_path = Some(PathBuf::from(value(&args, i, "--output")));
            }
            "--help" | "-h" => {
                eprintln!("Usage: heat-runner [OPTIONS]");
                eprintln!("  --size <x> <y> <z>   Grid size in voxels (default: 32 32 32)");
                eprintln!("  --ticks <n>          Steps per algorithm (default: 120)");
                eprintln!("  --dt <seconds>       Time step (default: 1/30)");
                eprintln!("  --edge <meters>      Voxel edge length (default: 0.1)");
                eprintln!("  --cpu-only           Skip the GPU solver");
                eprintln!("  --output <path>      Save results as JSON");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let device = if config.cpu_only {
        SharedDevice::disabled()
    } else {
        log::info!("Initializing GPU...");
        SharedDevice::new()
    };

    let runner = match HeatRunner::new(config.clone()) {
        Ok(runner) => runner,
        Err(e) => {
            log::error!("Failed to set up heat runner: {}", e);
            process::exit(1);
        }
    };
    let results = match runner.run(&device) {
        Ok(results) => results,
        Err(e) => {
            log::error!("Heat run failed: {}", e);
            process::exit(1);
        }
    };

    println!("\n## Heat Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let label = format!("heat-{}", process::id());
        let run_report = report::RunReport::new(label, &config, results);
        if let Err(e) = report::save_report(path, &run_report) {
            log::error!("Failed to save results: {}", e);
            process::exit(1);
        }
        log::info!("Saved results to {}", path.display());
    }

    log::info!("Heat run complete.");
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v,
        None => {
            eprintln!("Missing value for {}", flag);
            process::exit(1);
        }
    }
}
