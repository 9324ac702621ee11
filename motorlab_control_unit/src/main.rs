//! # motorlab Control Unit
//!
//! Runs the control loop against the built-in simulated rig (first-order
//! motor plant + MPU6050 register model) for a fixed duration.
//!
//! - default: virtual time, as fast as the host allows
//! - `--realtime`: paced on the wall clock (`clock_nanosleep` with `rt`)
//!
//! Telemetry goes to `--telemetry FILE` as CSV or JSON lines.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use motorlab_common::config::LogLevel;
use motorlab_control_unit::config::{ControlUnitConfig, load_config};
use motorlab_control_unit::cycle::{CycleError, CycleRunner, RunSummary, StdClock, TickClock, rt_setup};
use motorlab_control_unit::sim::{SimHandle, SimRig};
use motorlab_control_unit::telemetry::{LineWriter, NullSink, TelemetryFormat, TelemetrySink};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// motorlab Control Unit: gyro-feedback motor control loop
#[derive(Parser, Debug)]
#[command(name = "motorlab_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Fixed-period PID / LQR velocity loop on a simulated gimbal motor")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(default_value = "config/motorlab.toml")]
    config: PathBuf,

    /// Run length [s].
    #[arg(short, long, default_value_t = 2.0)]
    duration_s: f64,

    /// Write telemetry to this file.
    #[arg(short, long, value_name = "FILE")]
    telemetry: Option<PathBuf>,

    /// Telemetry file format.
    #[arg(long, value_enum, default_value_t = TelemetryFormat::Csv)]
    format: TelemetryFormat,

    /// Pace ticks on the wall clock instead of virtual time.
    #[arg(long)]
    realtime: bool,

    /// CPU core to pin the loop thread to (realtime only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (realtime only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);
    let level = config.as_ref().map(|c| c.shared.log_level).unwrap_or_default();
    setup_tracing(&args, level);

    info!("motorlab Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|cfg| run(&args, &cfg));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("motorlab Control Unit shutdown complete");
}

fn run(args: &Args, cfg: &ControlUnitConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !(args.duration_s > 0.0 && args.duration_s.is_finite()) {
        return Err(format!("--duration-s {} must be positive", args.duration_s).into());
    }
    let ticks = (args.duration_s / cfg.loop_cfg.dt()).round() as u64;
    info!(
        service = %cfg.shared.service_name,
        mode = ?cfg.control.mode,
        cycle_time_us = cfg.loop_cfg.cycle_time_us,
        ticks,
        realtime = args.realtime,
        "config OK"
    );

    let sink: Box<dyn TelemetrySink> = match &args.telemetry {
        Some(path) => {
            let file = File::create(path)?;
            info!(path = %path.display(), format = ?args.format, "writing telemetry");
            Box::new(LineWriter::new(BufWriter::new(file), args.format))
        }
        None => Box::new(NullSink),
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::Release);
    })?;

    let rig = SimRig::new(&cfg.sim, &cfg.motor, cfg.sensor.address);
    let handle = rig.handle.clone();

    let summary = if args.realtime {
        rt_setup(args.cpu_core, args.rt_priority)?;
        #[cfg(feature = "rt")]
        let clock = handle.paced(motorlab_control_unit::cycle::MonotonicClock::new()?);
        #[cfg(not(feature = "rt"))]
        let clock = handle.paced(StdClock::new());
        drive(cfg, rig.gyro, rig.driver, clock, sink, &running, ticks, &handle)
    } else {
        drive(cfg, rig.gyro, rig.driver, rig.clock, sink, &running, ticks, &handle)
    }?;

    info!(
        ticks = summary.ticks,
        skipped = summary.skipped,
        overruns = summary.overruns,
        flags = %summary.flags,
        final_velocity = handle.true_velocity(),
        "run complete"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn drive<C: TickClock>(
    cfg: &ControlUnitConfig,
    gyro: motorlab_control_unit::sim::SimGyro,
    driver: motorlab_control_unit::sim::SimPhaseDriver,
    clock: C,
    sink: Box<dyn TelemetrySink>,
    running: &AtomicBool,
    ticks: u64,
    handle: &SimHandle,
) -> Result<RunSummary, CycleError> {
    let mut runner = CycleRunner::from_config(cfg, gyro, driver, clock, sink);
    match runner.run(running, Some(ticks)) {
        Ok(summary) => {
            if summary.flags.contains(motorlab_common::error::FaultFlags::OVERRUN) {
                warn!(max_cycle_ns = runner.stats().max_cycle_ns, "deadline overruns occurred");
            }
            Ok(summary)
        }
        Err(e) => {
            error!(
                tick = runner.tick_count(),
                true_velocity = handle.true_velocity(),
                flags = %runner.flags(),
                "loop halted"
            );
            Err(e)
        }
    }
}

/// `--verbose` wins over `[shared] log_level`; `RUST_LOG` adds directives.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        directive
            .parse()
            .unwrap_or_else(|_| tracing::Level::INFO.into()),
    );

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
