//! Hardware boundary of the tactus kernel.
//!
//! Input producers translate raw device signals into classified events and
//! submit them as tasks; output actions drive an opaque device sink from a
//! kernel worker. Wire protocols stay outside: a [`RawSignal`] arrives
//! already framed.

pub mod classifier;
pub mod coord;
pub mod error;
pub mod event;
pub mod interface;
pub mod output;
pub mod registry;
pub mod signal;
pub mod translate;

pub use classifier::{DoubleClickClassifier, PressClass, DEFAULT_DOUBLE_CLICK_WINDOW};
pub use coord::Coordinate;
pub use error::HardwareError;
pub use event::{InputEvent, InputEventKind, InputHandler, InputTask};
pub use interface::{HardwareInterface, InputDecoder};
pub use output::{
    IndicatorBoard, IndicatorCell, OutputAction, OutputPort, OutputSink, OutputTask,
    INDICATOR_TAG_SUFFIX,
};
pub use registry::{InterfaceRegistry, TranslatorCtor};
pub use signal::RawSignal;
pub use translate::{GridTranslator, RawKind, SignalTranslator, StripTranslator, Translated};
