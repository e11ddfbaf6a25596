use std::path::PathBuf;

use clap::Parser;

/// Host for the tactus real-time kernel.
///
/// Starts the scheduler and worker pool, wires a button grid fed from
/// stdin (`<address> <value>` per line), drives a clock on the precision
/// thread and periodically persists the indicator state.
#[derive(Parser, Debug)]
#[command(name = "tactus", about = "Real-time task kernel host")]
pub struct CliArgs {
    /// Path to a TOML config file (defaults + TACTUS_* env vars if not set)
    #[arg(long, env = "TACTUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registered interface key for the stdin device
    #[arg(long, default_value = "grid")]
    pub interface: String,

    /// Clock tempo in beats per minute (0 disables the clock)
    #[arg(long, default_value = "120")]
    pub bpm: u32,

    /// Where the indicator snapshot job writes its JSON
    #[arg(long, default_value = "tactus-snapshot.json")]
    pub snapshot_path: PathBuf,

    /// Seconds between metrics log lines (0 disables)
    #[arg(long, default_value = "10")]
    pub metrics_interval: u64,
}
