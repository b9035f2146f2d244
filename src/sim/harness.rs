//! CLI entry point for the roast simulation harness: runs a full preheat and
//! roast against the simulated plant in virtual time and writes the CSV log.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use roasty_rs::config::{Config, PlantMode, load_config};
use roasty_rs::controller::Controller;
use roasty_rs::engine::{EngineError, FinishedRoast, RoastEngine, StopOutcome};
use roasty_rs::plant::SimulatedPlant;
use roasty_rs::profile::{Profile, ProfileError, Setpoint};
use roasty_rs::scheduler::{ManualClock, tick_interval};
use roasty_rs::storage::RoastLogStore;

/// Simulation Harness CLI
#[derive(Parser, Debug)]
#[command(name = "sim-harness", about = "Offline roast simulation against the thermal model.")]
pub struct Cli {
    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for CSV logs
    #[arg(short, long, default_value = "./sim_output")]
    output: PathBuf,

    /// Roast profile as JSON (`{"setpoints": [...]}`); built-in demo if omitted
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Start the roast once the bean is within this many degrees of the preheat target
    #[arg(long, default_value_t = 5.0)]
    preheat_tolerance: f64,

    /// Give up preheating after this many simulated seconds
    #[arg(long, default_value_t = 600.0)]
    max_preheat: f64,

    /// Stop the roast this many simulated seconds after the last setpoint if it has not completed
    #[arg(long, default_value_t = 300.0)]
    overrun: f64,

    /// Seed for sensor noise (only used when [simulation] sensor_noise > 0)
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run preheat and roast (default)
    Run,
    /// Print the target curve sent to clients at roast start
    Preview,
}

fn demo_profile() -> Profile {
    Profile {
        setpoints: vec![
            Setpoint::new(0.0, 200.0),
            Setpoint::new(90.0, 185.0),
            Setpoint::new(240.0, 205.0),
            Setpoint::new(420.0, 220.0),
            Setpoint::new(540.0, 228.0),
        ],
    }
}

#[derive(Debug, Error)]
enum HarnessError {
    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_profile(path: &Path) -> Result<Profile, HarnessError> {
    let text = std::fs::read_to_string(path).map_err(|source| HarnessError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let profile: Profile = serde_json::from_str(&text).map_err(|source| HarnessError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    profile.validate()?;
    Ok(profile)
}

struct RunSummary {
    preheat_seconds: f64,
    ticks: usize,
    finished: Option<FinishedRoast>,
}

fn simulate(cli: &Cli, config: &Config, profile: Profile) -> Result<RunSummary, HarnessError> {
    let speed_up = config.roaster.speed_up_factor;
    let period = tick_interval(PlantMode::Simulated, speed_up);
    let clock = Arc::new(ManualClock::new());

    let mut plant = SimulatedPlant::new(config.simulation.clone(), clock.clone(), speed_up);
    if let Some(seed) = cli.seed {
        plant = plant.with_noise_seed(seed);
    }
    let mut engine = RoastEngine::new(
        plant.into(),
        Controller::new(config.controller),
        clock.clone(),
        speed_up,
        profile.clone(),
    );

    let target = engine.start_preheat()?;
    let mut preheat_seconds = 0.0;
    while preheat_seconds < cli.max_preheat {
        clock.advance(period);
        let Some(outcome) = engine.tick()? else {
            break;
        };
        preheat_seconds = outcome.snapshot.elapsed_time;
        if (target - outcome.snapshot.bean_temperature).abs() <= cli.preheat_tolerance {
            break;
        }
    }
    tracing::info!("Preheated for {:.0}s", preheat_seconds);

    engine.start_roast(profile.clone())?;
    let limit = profile.duration().unwrap_or(0.0) + cli.overrun;
    let mut ticks = 0;
    loop {
        clock.advance(period);
        let Some(outcome) = engine.tick()? else {
            break;
        };
        ticks += 1;
        if let Some(finished) = outcome.finished {
            return Ok(RunSummary {
                preheat_seconds,
                ticks,
                finished: Some(finished),
            });
        }
        if outcome.snapshot.elapsed_time >= limit {
            tracing::warn!("Roast did not complete within {:.0}s, stopping", limit);
            break;
        }
    }
    let finished = match engine.stop_roast() {
        StopOutcome::Stopped(roast) => Some(roast),
        StopOutcome::NoRoastInProgress => None,
    };
    Ok(RunSummary {
        preheat_seconds,
        ticks,
        finished,
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // 1. Load config (default or from file)
    let mut config = match &cli.config {
        Some(path) => match load_config(&path.to_string_lossy()) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    config.roaster.mode = PlantMode::Simulated;

    // 2. Profile
    let profile = match &cli.profile {
        Some(path) => match load_profile(path) {
            Ok(profile) => profile,
            Err(e) => {
                eprintln!("Failed to load profile: {e}");
                std::process::exit(1);
            }
        },
        None => demo_profile(),
    };

    // 3. Dispatch command
    match &cli.command {
        Some(Commands::Preview) => match profile.preview() {
            Ok(curve) => {
                println!("time,target_temperature");
                for (t, target) in curve.time.iter().zip(&curve.target_temperature) {
                    println!("{t},{target:.3}");
                }
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        Some(Commands::Run) | None => {
            let summary = match simulate(&cli, &config, profile) {
                Ok(summary) => summary,
                Err(e) => {
                    eprintln!("Simulation failed: {e}");
                    std::process::exit(1);
                }
            };
            println!("Preheat: {:.0}s", summary.preheat_seconds);
            println!("Roast ticks: {}", summary.ticks);
            let Some(roast) = summary.finished else {
                println!("No roast recorded");
                return;
            };
            if let Some(last) = roast.records.last() {
                println!("Final bean temperature: {:.1}", last.bean_temperature);
                println!("Roast time: {:.0}s", roast.roast_time(last));
            }
            println!("Outcome: {:?}", roast.reason);

            let store = RoastLogStore::new(&cli.output);
            match store.save(&roast).await {
                Ok(name) => println!("Log written to {}", cli.output.join(name).display()),
                Err(e) => {
                    eprintln!("Failed to write log: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
