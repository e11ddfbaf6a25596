use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::coord::Coordinate;

pub const DEFAULT_DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(250);

/// Outcome of classifying a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressClass {
    Single,
    Double,
}

/// Reclassifies a second press at the same coordinate within the window as
/// a double-click. Runs on the producer side, before any task is built.
#[derive(Debug)]
pub struct DoubleClickClassifier {
    window: Duration,
    last_press: HashMap<Coordinate, Instant>,
}

impl DoubleClickClassifier {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Classify a press at `coord` seen at `at`.
    ///
    /// A double-click consumes the remembered press, so a third rapid press
    /// starts a new pair.
    pub fn classify(&mut self, coord: Coordinate, at: Instant) -> PressClass {
        match self.last_press.get(&coord) {
            Some(&prev) if at.saturating_duration_since(prev) <= self.window => {
                self.last_press.remove(&coord);
                PressClass::Double
            }
            _ => {
                self.last_press.insert(coord, at);
                PressClass::Single
            }
        }
    }

    /// Forget presses older than the window.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last_press
            .retain(|_, at| now.saturating_duration_since(*at) <= window);
    }

    pub fn tracked(&self) -> usize {
        self.last_press.len()
    }
}

impl Default for DoubleClickClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_CLICK_WINDOW)
    }
}
