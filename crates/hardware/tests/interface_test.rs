use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tactus_hardware::{
    Coordinate, HardwareError, HardwareInterface, IndicatorBoard, InputEvent, InputEventKind,
    InputHandler, InterfaceRegistry, OutputPort, RawSignal,
};
use tactus_kernel::{Kernel, KernelConfig, TaskError};

fn config() -> KernelConfig {
    let mut config = KernelConfig::default();
    config.workers.threads = 2;
    config.workers.poll_ms = 20;
    config.timing.idle_poll_ms = 20;
    config
}

fn eventually(mut done: impl FnMut() -> bool) -> bool {
    let give_up = Instant::now() + Duration::from_secs(5);
    while Instant::now() < give_up {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn recorder() -> (Arc<dyn InputHandler>, Arc<Mutex<Vec<(InputEventKind, Coordinate)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: Arc<dyn InputHandler> =
        Arc::new(move |e: &InputEvent| -> Result<(), TaskError> {
            sink.lock().unwrap().push((e.kind, e.coord));
            Ok(())
        });
    (handler, seen)
}

const GRID_3_4: u32 = 3 + 4 * 8;

#[test]
fn presses_100ms_apart_become_double_click() {
    let kernel = Kernel::start(config()).unwrap();
    let (handler, seen) = recorder();
    let grid =
        HardwareInterface::from_registry(&InterfaceRegistry::builtin(), "grid", handler, kernel.handle())
            .unwrap();

    let t0 = Instant::now();
    assert!(grid.trigger(RawSignal::at(GRID_3_4, 127, t0)));
    assert!(grid.trigger(RawSignal::at(GRID_3_4, 127, t0 + Duration::from_millis(100))));

    assert!(eventually(|| seen.lock().unwrap().len() == 2));
    let mut kinds: Vec<_> = seen.lock().unwrap().iter().map(|(k, _)| *k).collect();
    kinds.sort_by_key(|k| k.name());
    assert_eq!(kinds, vec![InputEventKind::DoubleClick, InputEventKind::Press]);
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|(_, c)| *c == Coordinate::new(3, 4)));

    kernel.shutdown();
}

#[test]
fn presses_400ms_apart_stay_plain() {
    let kernel = Kernel::start(config()).unwrap();
    let (handler, seen) = recorder();
    let grid =
        HardwareInterface::from_registry(&InterfaceRegistry::builtin(), "grid", handler, kernel.handle())
            .unwrap();

    let t0 = Instant::now();
    grid.trigger(RawSignal::at(GRID_3_4, 127, t0));
    grid.trigger(RawSignal::at(GRID_3_4, 127, t0 + Duration::from_millis(400)));

    assert!(eventually(|| seen.lock().unwrap().len() == 2));
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|(k, _)| *k == InputEventKind::Press));
    assert_eq!(grid.submitted(), 2);

    kernel.shutdown();
}

#[test]
fn configured_window_is_used() {
    let mut cfg = config();
    cfg.input.double_click_window_ms = 50;
    let kernel = Kernel::start(cfg).unwrap();
    let (handler, seen) = recorder();
    let grid =
        HardwareInterface::from_registry(&InterfaceRegistry::builtin(), "grid", handler, kernel.handle())
            .unwrap();

    let t0 = Instant::now();
    grid.trigger(RawSignal::at(GRID_3_4, 127, t0));
    grid.trigger(RawSignal::at(GRID_3_4, 127, t0 + Duration::from_millis(100)));

    assert!(eventually(|| seen.lock().unwrap().len() == 2));
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|(k, _)| *k == InputEventKind::Press));

    kernel.shutdown();
}

#[test]
fn untranslatable_signal_yields_no_task() {
    let kernel = Kernel::start(config()).unwrap();
    let (handler, seen) = recorder();
    let grid =
        HardwareInterface::from_registry(&InterfaceRegistry::builtin(), "grid", handler, kernel.handle())
            .unwrap();

    assert!(!grid.trigger(RawSignal::new(999, 127)));
    assert_eq!(grid.ignored(), 1);
    assert_eq!(grid.submitted(), 0);

    thread::sleep(Duration::from_millis(50));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(kernel.metrics().total_executed(), 0);

    kernel.shutdown();
}

#[test]
fn unknown_interface_key() {
    let kernel = Kernel::start(config()).unwrap();
    let (handler, _) = recorder();
    let result =
        HardwareInterface::from_registry(&InterfaceRegistry::builtin(), "keytar", handler, kernel.handle());
    assert!(matches!(result, Err(HardwareError::UnknownInterface(_))));
    kernel.shutdown();
}

#[test]
fn output_port_drives_sink() {
    let kernel = Kernel::start(config()).unwrap();
    let board = Arc::new(IndicatorBoard::new());
    let indicators = OutputPort::new(kernel.handle(), board.clone(), "grid.indicator");
    let viewport = OutputPort::new(kernel.handle(), board.clone(), "grid.viewport");
    let clock = OutputPort::new(kernel.handle(), board.clone(), "grid.clock");

    assert!(indicators.set_indicator(Coordinate::new(1, 1), 3));
    assert!(viewport.scroll(Coordinate::new(0, 1)));
    assert!(clock.tick_at(1, Instant::now() + Duration::from_millis(30)));

    assert!(eventually(|| board.sends() == 3));
    assert_eq!(board.value(Coordinate::new(1, 1)), Some(3));
    assert_eq!(kernel.metrics().timed_fired, 1);

    kernel.shutdown();
}
