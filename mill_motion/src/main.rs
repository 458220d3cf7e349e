//! # Mill Motion Host
//!
//! Point-to-point motion host for the PRU-driven 3-axis mill. Loads the
//! machine configuration, installs the co-processor firmware, then runs
//! the motion sequencer on the main thread while a monitor thread
//! reports live position and speed.
//!
//! `--sim` swaps the UIO device for the in-process simulation backend,
//! which runs the identical sequencing path without hardware.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use mill_common::config::{ConfigLoader, MillConfig};
use mill_motion::monitor::{LogSink, PositionMonitor};
use mill_motion::origin::OriginLatch;
use mill_motion::sequencer::MotionSequencer;
use mill_pru::engine::{LiveSteps, StepEngine};
use mill_pru::sim::SimEngine;
use mill_pru::{firmware, uio};

/// Mill Motion Host — PRU-driven point-to-point CNC motion
#[derive(Parser, Debug)]
#[command(name = "mill_motion")]
#[command(version)]
#[command(about = "Sequences toolpath waypoints into PRU step commands")]
struct Args {
    /// Path to the machine configuration TOML.
    #[arg(long, default_value = "config/mill.toml")]
    config: PathBuf,

    /// Run against the in-process simulated engine instead of hardware.
    #[arg(long)]
    sim: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Mill Motion Host v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Mill Motion Host shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = MillConfig::load(&args.config)?;
    config.validate()?;
    info!(
        "Config OK: {} waypoints, speed {} mm/s, dwell {} ms, poll {} ms",
        config.toolpath.waypoints.len(),
        config.motion.speed_mm_s,
        config.motion.dwell_ms,
        config.motion.poll_period_ms,
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })?;

    if args.sim {
        info!("using simulated step engine");
        let (commander, tap) = SimEngine::new().split();
        run_machine(commander, tap, &config, shutdown)
    } else {
        let (commander, tap) = uio::open_pair(&config.pru.uio_path)?;
        firmware::load_firmware(&config.pru.rproc_dir, &config.pru.firmware)?;

        let result = run_machine(commander, tap, &config, shutdown);

        if let Err(e) = firmware::stop_firmware(&config.pru.rproc_dir) {
            warn!("firmware stop failed: {e}");
        }
        result
    }
}

/// Wire the sequencer and the monitor over a commander/tap pair and run
/// the toolpath to completion.
fn run_machine<E, L>(
    engine: E,
    tap: L,
    config: &MillConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>>
where
    E: StepEngine,
    L: LiveSteps + Send + 'static,
{
    let origin = OriginLatch::new();

    let scale = config.step_scale()?;
    let period = config.poll_period();
    let monitor_origin = origin.clone();
    let monitor_shutdown = shutdown.clone();
    let monitor = thread::Builder::new()
        .name("position-monitor".to_string())
        .spawn(move || {
            let mut monitor =
                PositionMonitor::new(tap, LogSink, scale, monitor_origin, period);
            monitor.run(&monitor_shutdown);
        })?;

    let mut sequencer = MotionSequencer::new(engine, config, origin)?;
    let result = sequencer.run(&shutdown);

    // Toolpath done (or aborted): stop the monitor's timer as well.
    shutdown.store(true, Ordering::SeqCst);
    if monitor.join().is_err() {
        warn!("position monitor thread panicked");
    }

    let stats = sequencer.stats();
    if let Some(max) = stats.max_travel {
        info!(
            "run summary: {} segments, longest travel {} ms",
            stats.segments_issued,
            max.as_millis()
        );
    }

    result.map_err(Into::into)
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
