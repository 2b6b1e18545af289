// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! ExamWatch - live exam proctoring monitor
//!
//! Runs the monitor headless, serving annotated frames, alerts and the
//! command API to dashboards over WebSocket.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use examwatch::{
    api,
    vision::{SimulatedCamera, SimulatedDetector},
    Config, Monitor, StreamingManager, NAME, VERSION,
};

/// ExamWatch - live exam proctoring monitor
#[derive(Parser, Debug)]
#[command(name = "examwatch")]
#[command(version = VERSION)]
#[command(about = "Debounced exam proctoring alerts from a camera feed")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with simulated camera and detector
    #[arg(long)]
    demo: bool,

    /// WebSocket server port
    #[arg(long)]
    ws_port: Option<u16>,

    /// Camera device index
    #[arg(long)]
    camera: Option<u32>,

    /// Write alerts as JSON lines to this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Start monitoring immediately instead of waiting for a command
    #[arg(long)]
    autostart: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", NAME, VERSION);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(port) = args.ws_port {
        config.streaming.websocket_port = port;
    }
    if let Some(camera) = args.camera {
        config.capture.camera_index = camera;
    }
    if let Some(dir) = args.export_dir {
        config.streaming.export_enabled = true;
        config.streaming.export_path = dir.to_string_lossy().into_owned();
    }
    if config.streaming.alert_history.is_none() {
        config.streaming.alert_history = config.alerts.retention;
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_headless(config, args.autostart))
}

async fn run_headless(config: Config, autostart: bool) -> Result<()> {
    if !config.demo_mode {
        bail!("No camera or landmark backend is built in; run with --demo");
    }

    let streaming = Arc::new(StreamingManager::new(config.streaming.clone())?);
    let monitor = Arc::new(Monitor::new(
        &config,
        Arc::new(SimulatedCamera::default()),
        Arc::new(SimulatedDetector::new()),
        streaming.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (commands_tx, commands_rx) = mpsc::channel(32);

    let api_task = tokio::spawn(api::serve(monitor.clone(), commands_rx));
    match streaming.start(commands_tx, shutdown_rx).await? {
        Some(addr) => info!("Dashboard endpoint: ws://{}", addr),
        None => warn!("WebSocket server disabled; commands are unavailable"),
    }

    if autostart {
        monitor.start().await?;
    }

    info!("{} running, press Ctrl+C to shutdown", NAME);
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    monitor.stop().await;
    let _ = shutdown_tx.send(());
    api_task.abort();

    let status = monitor.status().await;
    info!(
        frames = status.frames_processed,
        alerts = status.alerts_logged,
        "{} shutdown complete",
        NAME
    );
    Ok(())
}
