//! Raw signal translators.
//!
//! A translator turns a [`RawSignal`] into a [`Translated`] event for one
//! family of surfaces. Signals it does not understand yield `None`; live
//! input routinely carries irrelevant traffic, so that is not an error.

use crate::coord::Coordinate;
use crate::signal::RawSignal;

/// Event kinds a translator can produce. Double-clicks are not among them:
/// they are derived afterwards from timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Press,
    Release,
    ValueChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translated {
    pub kind: RawKind,
    pub coord: Coordinate,
    pub value: i32,
}

/// Protocol-specific translation for one interface family.
pub trait SignalTranslator: Send + Sync {
    /// Registry key of the interface family.
    fn kind(&self) -> &'static str;

    fn translate(&self, raw: &RawSignal) -> Option<Translated>;
}

/// Button grid: `address = y * width + x`; a positive value is a press,
/// zero a release.
#[derive(Debug, Clone)]
pub struct GridTranslator {
    pub width: u32,
    pub height: u32,
}

impl GridTranslator {
    pub const KEY: &'static str = "grid";

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for GridTranslator {
    fn default() -> Self {
        Self::new(8, 8)
    }
}

impl SignalTranslator for GridTranslator {
    fn kind(&self) -> &'static str {
        Self::KEY
    }

    fn translate(&self, raw: &RawSignal) -> Option<Translated> {
        if self.width == 0 || raw.address >= self.width * self.height || raw.value < 0 {
            return None;
        }
        let coord = Coordinate::new(
            (raw.address % self.width) as i32,
            (raw.address / self.width) as i32,
        );
        let kind = if raw.value > 0 { RawKind::Press } else { RawKind::Release };
        Some(Translated {
            kind,
            coord,
            value: raw.value,
        })
    }
}

/// Row of continuous controls (faders, knobs): `address` is the column and
/// `value` the position in `0..=max_value`.
#[derive(Debug, Clone)]
pub struct StripTranslator {
    pub columns: u32,
    pub max_value: i32,
}

impl StripTranslator {
    pub const KEY: &'static str = "strip";

    pub fn new(columns: u32, max_value: i32) -> Self {
        Self { columns, max_value }
    }
}

impl Default for StripTranslator {
    fn default() -> Self {
        Self::new(8, 127)
    }
}

impl SignalTranslator for StripTranslator {
    fn kind(&self) -> &'static str {
        Self::KEY
    }

    fn translate(&self, raw: &RawSignal) -> Option<Translated> {
        if raw.address >= self.columns || !(0..=self.max_value).contains(&raw.value) {
            return None;
        }
        Some(Translated {
            kind: RawKind::ValueChange,
            coord: Coordinate::new(raw.address as i32, 0),
            value: raw.value,
        })
    }
}
