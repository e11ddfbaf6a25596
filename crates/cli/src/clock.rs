use std::time::{Duration, Instant};

use tactus_hardware::OutputPort;
use tracing::{debug, info};

/// How far ahead of its fire time each tick is handed to the precision
/// thread.
const TICK_LEAD: Duration = Duration::from_millis(50);

pub fn beat_period(bpm: u32) -> Option<Duration> {
    (bpm > 0).then(|| Duration::from_secs(60) / bpm)
}

/// Schedule clock ticks on the precision thread, one beat ahead, until the
/// kernel stops accepting them.
pub async fn run_clock(port: OutputPort, period: Duration) {
    let start = Instant::now() + period;
    info!(period_ms = period.as_millis() as u64, "Clock started");

    for beat in 1u64.. {
        let fire_at = start + period * (beat - 1) as u32;
        let hand_off = fire_at.checked_sub(TICK_LEAD).unwrap_or(fire_at);
        tokio::time::sleep_until(tokio::time::Instant::from_std(hand_off)).await;

        if !port.tick_at(beat, fire_at) {
            debug!(beat, "Clock tick rejected, stopping clock");
            break;
        }
    }
}
