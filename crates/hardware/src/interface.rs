//! Producer side of the kernel: raw signal in, scheduled task out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tactus_kernel::{Job, KernelHandle, LatencyClass};
use tracing::{debug, trace};

use crate::classifier::{DoubleClickClassifier, PressClass};
use crate::error::HardwareError;
use crate::event::{InputEvent, InputEventKind, InputHandler, InputTask};
use crate::registry::InterfaceRegistry;
use crate::signal::RawSignal;
use crate::translate::{RawKind, SignalTranslator};

/// Translation plus double-click classification. Holds no kernel state.
pub struct InputDecoder {
    translator: Box<dyn SignalTranslator>,
    classifier: Mutex<DoubleClickClassifier>,
}

impl InputDecoder {
    pub fn new(translator: Box<dyn SignalTranslator>, double_click_window: Duration) -> Self {
        Self {
            translator,
            classifier: Mutex::new(DoubleClickClassifier::new(double_click_window)),
        }
    }

    pub fn interface(&self) -> &'static str {
        self.translator.kind()
    }

    /// Classified event for `raw`, or `None` if the translator does not
    /// understand it.
    pub fn decode(&self, raw: RawSignal) -> Option<InputEvent> {
        let translated = self.translator.translate(&raw)?;
        let kind = match translated.kind {
            RawKind::Press => {
                let mut classifier = self
                    .classifier
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                classifier.prune(raw.received_at);
                let class = classifier.classify(translated.coord, raw.received_at);
                match class {
                    PressClass::Single => InputEventKind::Press,
                    PressClass::Double => InputEventKind::DoubleClick,
                }
            }
            RawKind::Release => InputEventKind::Release,
            RawKind::ValueChange => InputEventKind::ValueChange,
        };
        Some(InputEvent {
            kind,
            coord: translated.coord,
            value: translated.value,
            interface: self.translator.kind(),
            cause: raw,
        })
    }
}

impl std::fmt::Debug for InputDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDecoder")
            .field("interface", &self.interface())
            .finish()
    }
}

/// A connected device: decodes raw signals and submits the resulting input
/// tasks to the kernel.
pub struct HardwareInterface {
    decoder: InputDecoder,
    handler: Arc<dyn InputHandler>,
    kernel: KernelHandle,
    submitted: AtomicU64,
    ignored: AtomicU64,
}

impl HardwareInterface {
    pub fn new(decoder: InputDecoder, handler: Arc<dyn InputHandler>, kernel: KernelHandle) -> Self {
        Self {
            decoder,
            handler,
            kernel,
            submitted: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Build the interface registered under `key`, using the kernel's
    /// configured double-click window.
    pub fn from_registry(
        registry: &InterfaceRegistry,
        key: &str,
        handler: Arc<dyn InputHandler>,
        kernel: KernelHandle,
    ) -> Result<Self, HardwareError> {
        let translator = registry.create(key)?;
        let window = kernel.config().double_click_window();
        debug!(interface = key, window_ms = window.as_millis() as u64, "Hardware interface created");
        Ok(Self::new(InputDecoder::new(translator, window), handler, kernel))
    }

    pub fn interface(&self) -> &'static str {
        self.decoder.interface()
    }

    /// Translate `raw` and submit the resulting task.
    ///
    /// Returns `false` when the signal was not understood or the kernel did
    /// not accept the task.
    pub fn trigger(&self, raw: RawSignal) -> bool {
        let address = raw.address;
        let Some(event) = self.decoder.decode(raw) else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            trace!(interface = self.interface(), address, "Untranslatable signal dropped");
            return false;
        };

        let class = match event.kind {
            InputEventKind::ValueChange => LatencyClass::Relay,
            _ => LatencyClass::Interactive,
        };
        trace!(
            interface = self.interface(),
            kind = event.kind.name(),
            coord = %event.coord,
            "Input event"
        );
        let latency = self.kernel.latency_for(class);
        let task = InputTask::new(event, Arc::clone(&self.handler), latency);
        let accepted = self.kernel.schedule(Job::new(task));
        if accepted {
            self.submitted.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for HardwareInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareInterface")
            .field("interface", &self.interface())
            .field("submitted", &self.submitted())
            .field("ignored", &self.ignored())
            .finish()
    }
}
