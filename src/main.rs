// src/main.rs - Roaster host: config, plant, roaster task and web server
use clap::Parser;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::sync::broadcast;

use roasty_rs::config::{self, Config};
use roasty_rs::controller::Controller;
use roasty_rs::engine::RoastEngine;
use roasty_rs::plant;
use roasty_rs::profile::Profile;
use roasty_rs::roaster::RoasterService;
use roasty_rs::scheduler::{SystemClock, TimeSource, tick_interval};
use roasty_rs::storage::{ProfileStore, RoastLogStore};
use roasty_rs::web::{AppState, create_router};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coffee roaster control host
#[derive(Parser, Debug)]
#[command(name = "roaster-host", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "roaster.toml")]
    config: String,

    /// Override the [web] bind address
    #[arg(long)]
    bind: Option<String>,

    /// Log every control tick
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    tracing::info!("Starting roasty-rs roaster host");
    tracing::info!("Loading configuration from: {}", args.config);

    let mut config: Config = config::load_config(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        Box::new(e) as BoxError
    })?;
    if let Some(bind) = args.bind {
        config.web.bind = bind;
    }

    let speed_up = config.roaster.effective_speed_up();
    tracing::info!("Plant: {:?}, speed-up {}x", config.roaster.mode, speed_up);

    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock::new());
    let plant = plant::build(&config, clock.clone()).map_err(|e| {
        tracing::error!("Failed to set up the plant: {}", e);
        Box::new(e) as BoxError
    })?;
    let engine = RoastEngine::new(
        plant,
        Controller::new(config.controller),
        clock,
        speed_up,
        Profile::constant(config.roaster.default_preheat_temperature),
    );

    let logs = RoastLogStore::new(&config.storage.roast_logs_dir);
    let profiles = ProfileStore::new(&config.storage.profiles_dir);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let (roaster, mut service) = RoasterService::spawn(
        engine,
        Arc::new(logs.clone()),
        tick_interval(config.roaster.mode, speed_up),
        shutdown_tx.subscribe(),
    );

    let app = create_router(AppState {
        roaster,
        logs,
        profiles,
        shutdown: shutdown_tx.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.web.bind).await?;
    tracing::info!("Listening on {}", config.web.bind);

    let signal_tx = shutdown_tx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Interrupt received, shutting down");
        let _ = signal_tx.send(());
    });

    tokio::select! {
        result = server.into_future() => {
            result?;
        }
        joined = &mut service => {
            // The roaster task only stops early on a plant failure.
            let _ = shutdown_tx.send(());
            joined??;
            return Ok(());
        }
    }

    // Let the roaster task save a roast that was still running.
    service.await??;
    tracing::info!("Roaster host stopped");
    Ok(())
}
