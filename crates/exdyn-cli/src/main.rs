//! Driver for the explicit elastodynamics engine: loads a JSON
//! simulation config, builds the demo bar problem, runs the time
//! loop, and prints a run summary.

use std::process::ExitCode;

use serde::Deserialize;

use exdyn_model::FieldRole;
use exdyn_solver::{demo, BarProblem, SimulationConfig};

#[derive(Debug, Deserialize)]
struct DriverConfig {
    #[serde(flatten)]
    sim: SimulationConfig,
    bar: BarConfig,
}

#[derive(Debug, Deserialize)]
struct BarConfig {
    num_nodes: usize,
    spacing: f64,
    drive_rate: f64,
}

fn usage() {
    eprintln!("usage: exdyn-cli run <config.json>");
}

fn setup_logging() -> Result<(), fern::InitError> {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn run(path: &str) -> Result<(), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read '{path}': {err}"))?;
    let config: DriverConfig =
        serde_json::from_str(&text).map_err(|err| format!("cannot parse '{path}': {err}"))?;

    let bar = BarProblem {
        num_nodes: config.bar.num_nodes,
        spacing: config.bar.spacing,
        drive_rate: config.bar.drive_rate,
    };
    let mut formulation = bar.build(&config.sim).map_err(|err| err.to_string())?;
    formulation
        .initialize(config.sim.dimension, config.sim.normalizer)
        .map_err(|err| err.to_string())?;

    let stable = formulation.stable_dt();
    log::info!("stable explicit dt bound: {stable:e}");

    let steps = demo::run(&mut formulation, &config.sim).map_err(|err| err.to_string())?;

    let disp = formulation
        .fields()
        .get(FieldRole::DispT)
        .map_err(|err| err.to_string())?;
    let normalizer = formulation.normalizer();
    let last_x = disp.as_slice()[2 * (config.bar.num_nodes - 1)];

    println!("steps: {steps}");
    println!("dt: {}", config.sim.time.dt);
    println!("stable_dt_bound: {stable:e}");
    println!(
        "end_displacement_x: {:e}",
        normalizer.dimensionalize_length(last_x)
    );
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 || args[1] != "run" {
        usage();
        return ExitCode::from(2);
    }

    if let Err(err) = setup_logging() {
        eprintln!("logging setup failed: {err:?}");
        return ExitCode::from(1);
    }

    match run(&args[2]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
