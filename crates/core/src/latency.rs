use serde::{Deserialize, Serialize};

/// Urgency class of a task kind. Each class maps to a latency budget in
/// [`LatencyBudgets`](crate::LatencyBudgets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Interactive feedback (button press echo, viewport scroll).
    Interactive,
    /// Generic relay of a signal to another consumer.
    Relay,
    /// Anything without a stated urgency.
    Default,
    /// Indicator refreshes and other work that may wait indefinitely.
    Background,
}

impl LatencyClass {
    pub const ALL: [LatencyClass; 4] = [
        LatencyClass::Interactive,
        LatencyClass::Relay,
        LatencyClass::Default,
        LatencyClass::Background,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Relay => "relay",
            Self::Default => "default",
            Self::Background => "background",
        }
    }
}

impl std::fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
