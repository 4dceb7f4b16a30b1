/*
 * Integration tests for the control loop
 *
 * The controller is driven against an in-memory device tree and a configuration
 * file in a temporary directory.
 */

use amdfan::{
    controller::READY_MESSAGE,
    logging::Logger,
    source::{DeviceSource, MemorySource},
    Controller, FanControlError,
};
use log::{Level, Log, Metadata, Record};
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tempfile::TempDir;

const CURVE: &str = "speed_matrix:\n- [0, 4]\n- [50, 50]\n- [90, 100]\n";

#[derive(Default)]
struct Capture(Mutex<Vec<(Level, String)>>);

impl Capture {
    fn contains(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.0
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    config: PathBuf,
    source: Arc<MemorySource>,
    capture: Arc<Capture>,
}

impl Fixture {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("amdfan.yml");
        fs::write(&path, config).unwrap();

        Self {
            _dir: dir,
            config: path,
            source: Arc::new(MemorySource::new()),
            capture: Arc::new(Capture::default()),
        }
    }

    fn rewrite(&self, config: &str) {
        fs::write(&self.config, config).unwrap();
    }

    fn controller(&self) -> amdfan::Result<Controller> {
        let source: Arc<dyn DeviceSource> = self.source.clone();
        Controller::new(&self.config, source, Logger::new(self.capture.clone()))
    }

    fn pwm_writes(&self, card: &str) -> Vec<String> {
        self.source.writes_to(card, "pwm1")
    }
}

#[test]
fn test_every_tick_writes_without_threshold() {
    let fx = Fixture::new(&format!("{}frequency: 1\n", CURVE));
    fx.source.add_card("card0", 45.0, 0, 255);
    let mut controller = fx.controller().unwrap();
    assert_eq!(controller.period(), Duration::from_secs(1));

    // 45°C -> 45.4% -> 45% of 0..255
    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0"), vec!["115"]);
    assert_eq!(fx.source.writes_to("card0", "pwm1_enable"), vec!["1"]);

    // A single degree still triggers a write
    fx.source.set_temperature("card0", 46.0);
    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0"), vec!["115", "117"]);
    assert_eq!(controller.last_temperature("card0"), Some(46.0));
}

#[test]
fn test_speed_is_rescaled_into_device_range() {
    let fx = Fixture::new("speed_matrix: [[10, 10], [80, 100]]\n");
    fx.source.add_card("card0", 90.0, 50, 200);
    let mut controller = fx.controller().unwrap();

    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0"), vec!["200"]);
}

#[test]
fn test_hysteresis_suppresses_small_changes() {
    let fx = Fixture::new(&format!("{}threshold: 4\n", CURVE));
    fx.source.add_card("card0", 60.0, 0, 255);
    let mut controller = fx.controller().unwrap();

    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0").len(), 1);
    assert_eq!(controller.last_temperature("card0"), Some(60.0));

    // Inside [56, 64)
    fx.source.set_temperature("card0", 62.0);
    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0").len(), 1);
    assert_eq!(controller.last_temperature("card0"), Some(60.0));

    fx.source.set_temperature("card0", 65.0);
    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0").len(), 2);
    assert_eq!(controller.last_temperature("card0"), Some(65.0));

    // The band moved with the last applied reading
    fx.source.set_temperature("card0", 61.0);
    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0").len(), 2);
}

#[test]
fn test_hysteresis_is_tracked_per_card() {
    let fx = Fixture::new(&format!("{}threshold: 4\n", CURVE));
    fx.source.add_card("card0", 60.0, 0, 255);
    fx.source.add_card("card1", 40.0, 0, 255);
    let mut controller = fx.controller().unwrap();

    controller.tick().unwrap();
    fx.source.set_temperature("card0", 61.0);
    fx.source.set_temperature("card1", 50.0);
    controller.tick().unwrap();

    assert_eq!(fx.pwm_writes("card0").len(), 1);
    assert_eq!(fx.pwm_writes("card1").len(), 2);
}

#[test]
fn test_allowlist_from_config() {
    let fx = Fixture::new(&format!("{}cards:\n- card0\n", CURVE));
    fx.source.add_card("card0", 50.0, 0, 255);
    fx.source.add_card("card1", 50.0, 0, 255);
    let mut controller = fx.controller().unwrap();

    controller.tick().unwrap();
    assert_eq!(controller.registry().ids().collect::<Vec<_>>(), vec!["card0"]);
    assert!(fx.pwm_writes("card1").is_empty());
}

#[test]
fn test_empty_card_list_manages_every_card() {
    let fx = Fixture::new("speed_matrix: [[0, 4], [90, 100]]\ncards: []\n");
    fx.source.add_card("card0", 50.0, 0, 255);
    let controller = fx.controller().unwrap();

    assert_eq!(controller.registry().ids().collect::<Vec<_>>(), vec!["card0"]);
}

#[test]
fn test_start_without_cards_fails() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    fx.source.remove("card0", "pwm1_max");

    let err = fx.controller().err().expect("startup should fail");
    assert!(matches!(err, FanControlError::NoCompatibleDevice));
    assert_eq!(err.to_string(), "no compatible cards found");
    // Reported once, by whoever ends the process
    assert!(!fx.capture.contains(Level::Error, "no compatible cards found"));
}

#[test]
fn test_start_with_invalid_curve_fails() {
    let fx = Fixture::new("speed_matrix: [[10, 2], [80, 100]]\n");
    fx.source.add_card("card0", 50.0, 0, 255);

    assert!(matches!(fx.controller(), Err(FanControlError::Curve(_))));
}

#[test]
fn test_reload_with_invalid_curve_keeps_previous_state() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    let mut controller = fx.controller().unwrap();
    let curve = controller.curve().clone();

    fx.rewrite("speed_matrix: [[10, 50], [80, 40]]\n");
    assert!(!controller.reload());
    assert_eq!(controller.curve(), &curve);
    assert_eq!(controller.registry().len(), 1);
    assert!(fx.capture.contains(Level::Error, "keeping the previous one"));

    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0"), vec!["128"]);
}

#[test]
fn test_reload_without_cards_keeps_previous_state() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    let mut controller = fx.controller().unwrap();

    fx.rewrite(&format!("{}cards:\n- card9\n", CURVE));
    assert!(!controller.reload());
    assert_eq!(controller.registry().ids().collect::<Vec<_>>(), vec!["card0"]);
}

#[test]
fn test_reload_applies_new_curve_and_resets_hysteresis() {
    let fx = Fixture::new(&format!("{}threshold: 4\n", CURVE));
    fx.source.add_card("card0", 50.0, 0, 255);
    let mut controller = fx.controller().unwrap();
    controller.tick().unwrap();
    assert_eq!(controller.last_temperature("card0"), Some(50.0));

    fx.rewrite("speed_matrix: [[0, 100], [90, 100]]\nthreshold: 4\nfrequency: 2\n");
    assert!(controller.reload());
    assert_eq!(controller.last_temperature("card0"), None);
    assert_eq!(controller.period(), Duration::from_secs(2));

    // Same temperature, but the band was reset so the new curve applies at once
    controller.tick().unwrap();
    assert_eq!(fx.pwm_writes("card0"), vec!["128", "255"]);
}

#[test]
fn test_unreadable_card_is_skipped() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    fx.source.add_card("card1", 50.0, 0, 255);
    let mut controller = fx.controller().unwrap();

    fx.source.set("card0", "temp1_input", "");
    controller.tick().unwrap();

    assert!(fx.pwm_writes("card0").is_empty());
    assert_eq!(fx.pwm_writes("card1"), vec!["128"]);
    assert!(fx.capture.contains(Level::Warn, "card0"));
}

#[test]
fn test_permission_denied_aborts_tick() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    let mut controller = fx.controller().unwrap();

    fx.source.set_read_only(true);
    let err = controller.tick().unwrap_err();
    assert!(matches!(err, FanControlError::PermissionDenied { .. }));
    assert!(err.to_string().contains("are you running as root?"));
    assert!(!fx.capture.contains(Level::Error, "are you running as root?"));
}

#[tokio::test]
async fn test_run_reports_ready_and_stops() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    let controller = fx.controller().unwrap();
    let handle = controller.handle();
    let ready = SharedBuf::default();

    handle.stop();
    controller
        .run(Some(Box::new(ready.clone())))
        .await
        .unwrap();

    // The tick in flight completes before the loop exits
    assert_eq!(fx.pwm_writes("card0"), vec!["128"]);
    assert_eq!(ready.0.lock().unwrap().as_slice(), READY_MESSAGE);
    assert!(fx.capture.contains(Level::Info, "Stopped controller"));
}

#[tokio::test]
async fn test_reload_interrupts_wait() {
    let fx = Fixture::new(&format!("{}frequency: 30\n", CURVE));
    fx.source.add_card("card0", 50.0, 0, 255);
    let controller = fx.controller().unwrap();
    let handle = controller.handle();

    let task = tokio::spawn(controller.run(None));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fx.pwm_writes("card0"), vec!["128"]);

    fx.rewrite("speed_matrix: [[0, 100], [90, 100]]\nfrequency: 30\n");
    handle.reload();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fx.pwm_writes("card0"), vec!["128", "255"]);

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("controller did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_run_exits_on_permission_denied() {
    let fx = Fixture::new(CURVE);
    fx.source.add_card("card0", 50.0, 0, 255);
    fx.source.set_read_only(true);
    let controller = fx.controller().unwrap();

    let result = controller.run(None).await;
    assert!(matches!(
        result,
        Err(FanControlError::PermissionDenied { .. })
    ));
}
