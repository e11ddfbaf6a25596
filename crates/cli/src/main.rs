mod cli;
mod clock;
mod input;
mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use tactus_core::KernelConfig;
use tactus_hardware::{
    HardwareInterface, IndicatorBoard, InterfaceRegistry, OutputPort, INDICATOR_TAG_SUFFIX,
};
use tactus_kernel::Kernel;

use crate::cli::CliArgs;
use crate::input::ToggleHandler;
use crate::snapshot::{snapshot_job, DEFAULT_SNAPSHOT_INTERVAL, SNAPSHOT_JOB};

#[tokio::main]
async fn main() -> Result<()> {
    tactus_core::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => KernelConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => KernelConfig::from_env().context("invalid configuration")?,
    };
    config.log_summary();

    let kernel = Kernel::start(config).context("failed to start kernel")?;
    let handle = kernel.handle();

    // ── Output ──
    let board = Arc::new(IndicatorBoard::new());
    let tag = |suffix: &str| format!("{}.{suffix}", args.interface);
    let indicators = OutputPort::new(
        handle.clone(),
        board.clone(),
        &format!("{}{INDICATOR_TAG_SUFFIX}", args.interface),
    );
    let viewport = OutputPort::new(handle.clone(), board.clone(), &tag("viewport"));
    let clock_port = OutputPort::new(handle.clone(), board.clone(), &tag("clock"));

    // ── Input ──
    let handler = Arc::new(ToggleHandler {
        board: Arc::clone(&board),
        indicators,
        viewport,
    });
    let registry = InterfaceRegistry::builtin();
    let device = Arc::new(
        HardwareInterface::from_registry(&registry, &args.interface, handler, handle.clone())
            .with_context(|| format!("available interfaces: {}", registry.keys().join(", ")))?,
    );
    let stdin_task = tokio::spawn(input::pump_stdin(Arc::clone(&device)));

    // ── Periodic jobs ──
    let clock_task = clock::beat_period(args.bpm)
        .map(|period| tokio::spawn(clock::run_clock(clock_port, period)));

    let interval = handle
        .repeat_interval(SNAPSHOT_JOB)
        .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL);
    let (job, snapshot_policy) =
        snapshot_job(args.snapshot_path.clone(), Arc::clone(&board), handle.clone(), interval);
    if !handle.schedule(job) {
        warn!("Snapshot job was not accepted");
    }

    let metrics_task = (args.metrics_interval > 0).then(|| {
        let handle = handle.clone();
        let every = Duration::from_secs(args.metrics_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let m = handle.metrics();
                info!(
                    executed = m.total_executed(),
                    failures = m.total_failures(),
                    dispatched = m.dispatched,
                    timed = m.timed_fired,
                    late = m.late_dispatches,
                    max_late_ms = m.max_dispatch_lateness.as_millis() as u64,
                    utilization = format!("{:.0}%", m.worker_utilization * 100.0),
                    pending = handle.pending(),
                    "Kernel metrics"
                );
            }
        })
    });

    info!(
        interface = device.interface(),
        snapshot = %args.snapshot_path.display(),
        "tactus running, Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutting down");

    snapshot_policy.stop();
    stdin_task.abort();
    if let Some(task) = clock_task {
        task.abort();
    }
    if let Some(task) = metrics_task {
        task.abort();
    }

    let report = tokio::task::spawn_blocking(move || kernel.shutdown())
        .await
        .context("kernel shutdown panicked")?;
    info!(
        pending_dropped = report.pending_dropped,
        timed_dropped = report.timed_dropped,
        threads_joined = report.threads_joined,
        threads_panicked = report.threads_panicked,
        uptime_secs = report.uptime.as_secs(),
        "Kernel stopped"
    );
    println!("{}", serde_json::to_string_pretty(&report.metrics)?);

    Ok(())
}
