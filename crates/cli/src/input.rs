//! Stdin-fed device: one `<address> <value>` pair per line.

use std::sync::Arc;

use tactus_hardware::{
    HardwareInterface, IndicatorBoard, InputEvent, InputEventKind, InputHandler, OutputPort,
    RawSignal,
};
use tactus_kernel::TaskError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Parse `<address> <value>`. Blank lines, `#` comments and malformed
/// lines yield `None`.
pub fn parse_signal(line: &str) -> Option<RawSignal> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split_whitespace();
    let address = parts.next()?.parse().ok()?;
    let value = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(RawSignal::new(address, value))
}

/// Feed stdin lines to `device` until EOF.
pub async fn pump_stdin(device: Arc<HardwareInterface>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_signal(&line) {
            Some(raw) => {
                device.trigger(raw);
            }
            None => debug!(line = %line, "Ignoring input line"),
        }
    }
    info!(
        submitted = device.submitted(),
        ignored = device.ignored(),
        "stdin closed"
    );
    Ok(())
}

/// Press toggles the indicator under the button, double-click scrolls the
/// viewport towards it.
pub struct ToggleHandler {
    pub board: Arc<IndicatorBoard>,
    pub indicators: OutputPort,
    pub viewport: OutputPort,
}

impl InputHandler for ToggleHandler {
    fn handle(&self, event: &InputEvent) -> Result<(), TaskError> {
        let accepted = match event.kind {
            InputEventKind::Press => {
                let lit = self.board.value(event.coord).is_some_and(|v| v != 0);
                let value = if lit { 0 } else { event.value };
                self.indicators.set_indicator(event.coord, value)
            }
            InputEventKind::DoubleClick => self.viewport.scroll(event.coord),
            InputEventKind::Release | InputEventKind::ValueChange => true,
        };
        if accepted {
            Ok(())
        } else {
            Err(TaskError::Sink("kernel is not accepting output".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_value_pairs() {
        let raw = parse_signal("  35 127 ").unwrap();
        assert_eq!(raw.address, 35);
        assert_eq!(raw.value, 127);
    }

    #[test]
    fn rejects_junk() {
        assert!(parse_signal("").is_none());
        assert!(parse_signal("# comment").is_none());
        assert!(parse_signal("35").is_none());
        assert!(parse_signal("a 1").is_none());
        assert!(parse_signal("1 2 3").is_none());
        assert!(parse_signal("-1 2").is_none());
    }
}
