//! Headless flock runner.
//!
//! Usage: `flockgrid [CONFIG.json] [--gpu] [--frames N] [--validate-every N]`
//!
//! Set `RUST_LOG=info` (or `debug`) to see progress.

use std::path::PathBuf;
use std::time::Instant;

use flockgrid::{ComputeBackend, FlockSimulation, SimConfig, SimulationError};

struct Args {
    config: Option<PathBuf>,
    gpu: bool,
    frames: u64,
    validate_every: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args { config: None, gpu: false, frames: 600, validate_every: 0 };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--gpu" => args.gpu = true,
            "--frames" => {
                let value = iter.next().ok_or("--frames needs a value")?;
                args.frames = value.parse().map_err(|_| format!("invalid frame count `{}`", value))?;
            }
            "--validate-every" => {
                let value = iter.next().ok_or("--validate-every needs a value")?;
                args.validate_every = value.parse().map_err(|_| format!("invalid interval `{}`", value))?;
            }
            other if other.starts_with("--") => return Err(format!("unknown flag `{}`", other)),
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig, SimulationError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(SimConfig::default()),
    }
}

fn run_frames<B: ComputeBackend>(sim: &mut FlockSimulation<B>, args: &Args) -> Result<(), SimulationError> {
    let start = Instant::now();
    for frame in 1..=args.frames {
        // A failed frame is logged by the simulation; keep going.
        let _ = sim.step();

        if args.validate_every > 0 && frame % args.validate_every == 0 {
            let snapshot = sim.debug_snapshot()?;
            let diagnostics = sim.diagnostics()?;
            log::info!(
                "frame {}: {} interactions, {} reachable, clean = {}",
                frame,
                diagnostics.interactions,
                snapshot.report.reachable(),
                snapshot.report.is_clean() && diagnostics.is_clean()
            );
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    log::info!(
        "{} frames in {:.2}s ({:.1} fps), {} failed",
        sim.frame(),
        elapsed,
        sim.frame() as f64 / elapsed.max(f64::EPSILON),
        sim.failed_frames()
    );
    Ok(())
}

fn run(args: Args) -> Result<(), SimulationError> {
    let config = load_config(args.config.as_ref())?;
    if args.gpu {
        let mut sim = FlockSimulation::new_gpu(config)?;
        run_frames(&mut sim, &args)
    } else {
        let mut sim = FlockSimulation::new_cpu(config)?;
        run_frames(&mut sim, &args)
    }
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: flockgrid [CONFIG.json] [--gpu] [--frames N] [--validate-every N]");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
