use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TactusError;
use crate::latency::LatencyClass;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Top-level config ──────────────────────────────────────────

/// Everything the scheduling kernel and its producers read at startup.
///
/// Parsed from `tactus.toml`; every section and key is optional. After
/// parsing, `TACTUS_<SECTION>_<KEY>` environment variables override file
/// values and the result is validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub latency: LatencyBudgets,

    #[serde(default)]
    pub repeat: RepeatConfig,
}

// ── Section configs ───────────────────────────────────────────

/// Worker pool sizing and wait bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// Number of standard worker threads. 0 = 2 x logical cores.
    #[serde(default)]
    pub threads: usize,

    /// How long a blocked dispatch waits for "slot freed" before re-checking.
    #[serde(default = "default_slot_wait_ms")]
    pub slot_wait_ms: u64,

    /// Shutdown poll granularity for idle workers and the precision thread.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

fn default_slot_wait_ms() -> u64 {
    500
}

fn default_poll_ms() -> u64 {
    100
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            slot_wait_ms: default_slot_wait_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

/// Precision waiter and scheduler idle behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Below this remaining time the waiter stops sleeping and spins.
    #[serde(default = "default_spin_threshold_ms")]
    pub spin_threshold_ms: u64,

    /// Upper bound on a single idle wait of the scheduler thread.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

fn default_spin_threshold_ms() -> u64 {
    15
}

fn default_idle_poll_ms() -> u64 {
    100
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            spin_threshold_ms: default_spin_threshold_ms(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

/// Producer-side input classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Second press at the same coordinate within this window is a double-click.
    #[serde(default = "default_double_click_window_ms")]
    pub double_click_window_ms: u64,
}

fn default_double_click_window_ms() -> u64 {
    250
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            double_click_window_ms: default_double_click_window_ms(),
        }
    }
}

/// Latency budgets per [`LatencyClass`], in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBudgets {
    #[serde(default = "default_interactive_ms")]
    pub interactive_ms: u64,

    #[serde(default = "default_relay_ms")]
    pub relay_ms: u64,

    #[serde(default = "default_default_ms")]
    pub default_ms: u64,

    #[serde(default = "default_background_ms")]
    pub background_ms: u64,
}

fn default_interactive_ms() -> u64 {
    25
}

fn default_relay_ms() -> u64 {
    100
}

fn default_default_ms() -> u64 {
    500
}

fn default_background_ms() -> u64 {
    u64::from(u32::MAX)
}

impl Default for LatencyBudgets {
    fn default() -> Self {
        Self {
            interactive_ms: default_interactive_ms(),
            relay_ms: default_relay_ms(),
            default_ms: default_default_ms(),
            background_ms: default_background_ms(),
        }
    }
}

impl LatencyBudgets {
    /// Budget for a latency class.
    pub fn budget_for(&self, class: LatencyClass) -> Duration {
        Duration::from_millis(self.millis_for(class))
    }

    pub fn millis_for(&self, class: LatencyClass) -> u64 {
        match class {
            LatencyClass::Interactive => self.interactive_ms,
            LatencyClass::Relay => self.relay_ms,
            LatencyClass::Default => self.default_ms,
            LatencyClass::Background => self.background_ms,
        }
    }

    fn millis_for_mut(&mut self, class: LatencyClass) -> &mut u64 {
        match class {
            LatencyClass::Interactive => &mut self.interactive_ms,
            LatencyClass::Relay => &mut self.relay_ms,
            LatencyClass::Default => &mut self.default_ms,
            LatencyClass::Background => &mut self.background_ms,
        }
    }
}

/// Minimum intervals of named repeating jobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepeatConfig {
    /// Job name -> minimum interval in milliseconds.
    #[serde(default)]
    pub intervals: HashMap<String, u64>,
}

// ── Loading & validation ──────────────────────────────────────

impl KernelConfig {
    /// Parse config from a TOML string, apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, TactusError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TactusError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus environment overrides (no file).
    pub fn from_env() -> Result<Self, TactusError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Resolve worker thread count (0 means 2 x available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.workers.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(8)
        } else {
            self.workers.threads
        }
    }

    pub fn slot_wait(&self) -> Duration {
        Duration::from_millis(self.workers.slot_wait_ms)
    }

    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.workers.poll_ms)
    }

    pub fn spin_threshold(&self) -> Duration {
        Duration::from_millis(self.timing.spin_threshold_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.timing.idle_poll_ms)
    }

    pub fn double_click_window(&self) -> Duration {
        Duration::from_millis(self.input.double_click_window_ms)
    }

    /// Configured minimum interval for a named repeating job.
    pub fn repeat_interval(&self, job: &str) -> Option<Duration> {
        self.repeat.intervals.get(job).copied().map(Duration::from_millis)
    }

    // ── Environment variable overrides ──────────────────────────

    /// Apply `TACTUS_*` environment variable overrides.
    ///
    /// - `TACTUS_WORKERS_THREADS` → `workers.threads`
    /// - `TACTUS_WORKERS_SLOT_WAIT_MS` → `workers.slot_wait_ms`
    /// - `TACTUS_WORKERS_POLL_MS` → `workers.poll_ms`
    /// - `TACTUS_TIMING_SPIN_THRESHOLD_MS` → `timing.spin_threshold_ms`
    /// - `TACTUS_TIMING_IDLE_POLL_MS` → `timing.idle_poll_ms`
    /// - `TACTUS_INPUT_DOUBLE_CLICK_WINDOW_MS` → `input.double_click_window_ms`
    /// - `TACTUS_LATENCY_<CLASS>_MS` → `latency.<class>_ms`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring non-numeric config override");
                    None
                }
            }
        };

        if let Some(v) = read("TACTUS_WORKERS_THREADS") {
            self.workers.threads = v as usize;
        }
        if let Some(v) = read("TACTUS_WORKERS_SLOT_WAIT_MS") {
            self.workers.slot_wait_ms = v;
        }
        if let Some(v) = read("TACTUS_WORKERS_POLL_MS") {
            self.workers.poll_ms = v;
        }
        if let Some(v) = read("TACTUS_TIMING_SPIN_THRESHOLD_MS") {
            self.timing.spin_threshold_ms = v;
        }
        if let Some(v) = read("TACTUS_TIMING_IDLE_POLL_MS") {
            self.timing.idle_poll_ms = v;
        }
        if let Some(v) = read("TACTUS_INPUT_DOUBLE_CLICK_WINDOW_MS") {
            self.input.double_click_window_ms = v;
        }
        for class in LatencyClass::ALL {
            let key = format!("TACTUS_LATENCY_{}_MS", class.name().to_uppercase());
            if let Some(v) = read(&key) {
                *self.latency.millis_for_mut(class) = v;
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), TactusError> {
        if self.workers.slot_wait_ms == 0 {
            return Err(TactusError::Config("workers.slot_wait_ms must be > 0".into()));
        }
        if self.workers.poll_ms == 0 {
            return Err(TactusError::Config("workers.poll_ms must be > 0".into()));
        }
        if self.timing.idle_poll_ms == 0 {
            return Err(TactusError::Config("timing.idle_poll_ms must be > 0".into()));
        }
        self.validate_latency_order()?;
        for (name, ms) in &self.repeat.intervals {
            if *ms == 0 {
                return Err(TactusError::Config(format!(
                    "repeat interval for '{name}' must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Budgets must not get tighter as urgency drops.
    fn validate_latency_order(&self) -> Result<(), TactusError> {
        for pair in LatencyClass::ALL.windows(2) {
            let (tighter, looser) = (pair[0], pair[1]);
            if self.latency.millis_for(tighter) > self.latency.millis_for(looser) {
                return Err(TactusError::Config(format!(
                    "latency.{tighter}_ms ({}) exceeds latency.{looser}_ms ({})",
                    self.latency.millis_for(tighter),
                    self.latency.millis_for(looser),
                )));
            }
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Kernel config loaded:");
        tracing::info!(
            "  workers:  threads={} (resolved {}), slot_wait={}ms, poll={}ms",
            self.workers.threads,
            self.resolved_worker_threads(),
            self.workers.slot_wait_ms,
            self.workers.poll_ms
        );
        tracing::info!(
            "  timing:   spin_threshold={}ms, idle_poll={}ms",
            self.timing.spin_threshold_ms,
            self.timing.idle_poll_ms
        );
        tracing::info!("  input:    double_click_window={}ms", self.input.double_click_window_ms);
        tracing::info!(
            "  latency:  interactive={}ms, relay={}ms, default={}ms, background={}ms",
            self.latency.interactive_ms,
            self.latency.relay_ms,
            self.latency.default_ms,
            self.latency.background_ms
        );
        tracing::info!("  repeat:   {} named intervals", self.repeat.intervals.len());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.workers.threads, 0);
        assert_eq!(config.workers.slot_wait_ms, 500);
        assert_eq!(config.timing.spin_threshold_ms, 15);
        assert_eq!(config.input.double_click_window_ms, 250);
        assert_eq!(config.latency.interactive_ms, 25);
        assert_eq!(config.latency.relay_ms, 100);
        assert_eq!(config.latency.default_ms, 500);
        assert!(config.repeat.intervals.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn resolved_worker_threads() {
        let mut config = KernelConfig::default();
        // 0 means two per logical core
        let resolved = config.resolved_worker_threads();
        assert!(resolved >= 2);
        assert_eq!(resolved % 2, 0);

        config.workers.threads = 3;
        assert_eq!(config.resolved_worker_threads(), 3);
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let mut config: KernelConfig = toml::from_str("").unwrap();
        config.apply_overrides(|_| None);
        config.validate().unwrap();
        assert_eq!(config.timing.idle_poll_ms, 100);
        assert_eq!(config.latency.background_ms, u64::from(u32::MAX));
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[workers]
threads = 4
slot_wait_ms = 250

[timing]
spin_threshold_ms = 5

[input]
double_click_window_ms = 300

[latency]
interactive_ms = 10
relay_ms = 50

[repeat.intervals]
snapshot = 2000
"#;
        let mut config: KernelConfig = toml::from_str(toml).unwrap();
        config.apply_overrides(|_| None);
        config.validate().unwrap();

        assert_eq!(config.resolved_worker_threads(), 4);
        assert_eq!(config.slot_wait(), Duration::from_millis(250));
        assert_eq!(config.spin_threshold(), Duration::from_millis(5));
        assert_eq!(config.double_click_window(), Duration::from_millis(300));
        assert_eq!(
            config.latency.budget_for(LatencyClass::Interactive),
            Duration::from_millis(10)
        );
        // unspecified keys keep their defaults
        assert_eq!(config.latency.default_ms, 500);
        assert_eq!(config.repeat_interval("snapshot"), Some(Duration::from_secs(2)));
        assert_eq!(config.repeat_interval("missing"), None);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config: KernelConfig = toml::from_str("[workers]\nthreads = 4\n").unwrap();
        config.apply_overrides(|key| match key {
            "TACTUS_WORKERS_THREADS" => Some("6".into()),
            "TACTUS_LATENCY_INTERACTIVE_MS" => Some("5".into()),
            "TACTUS_TIMING_IDLE_POLL_MS" => Some("not-a-number".into()),
            _ => None,
        });

        assert_eq!(config.workers.threads, 6);
        assert_eq!(config.latency.interactive_ms, 5);
        assert_eq!(config.timing.idle_poll_ms, 100);
    }

    #[test]
    fn rejects_zero_slot_wait() {
        let err = KernelConfig::from_toml("[workers]\nslot_wait_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("slot_wait_ms"));
    }

    #[test]
    fn rejects_inverted_latency_budgets() {
        let err = KernelConfig::from_toml("[latency]\ninteractive_ms = 200\n").unwrap_err();
        assert!(err.to_string().contains("interactive"), "got: {err}");
    }

    #[test]
    fn rejects_zero_repeat_interval() {
        let err = KernelConfig::from_toml("[repeat.intervals]\nsnapshot = 0\n").unwrap_err();
        assert!(err.to_string().contains("snapshot"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = KernelConfig::from_toml("[workers\nthreads = ").unwrap_err();
        assert!(matches!(err, TactusError::ConfigParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[input]\ndouble_click_window_ms = 180").unwrap();

        let config = KernelConfig::from_file(file.path()).unwrap();
        assert_eq!(config.input.double_click_window_ms, 180);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = KernelConfig::from_file("/nonexistent/tactus.toml").unwrap_err();
        assert!(matches!(err, TactusError::Io(_)));
    }
}
