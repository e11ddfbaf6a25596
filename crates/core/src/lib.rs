pub mod config;
pub mod error;
pub mod latency;

pub use config::{
    InputConfig, KernelConfig, LatencyBudgets, RepeatConfig, TimingConfig, WorkersConfig,
    load_dotenv,
};
pub use error::*;
pub use latency::LatencyClass;
