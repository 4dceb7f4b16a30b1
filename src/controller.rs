//! The control loop applying the fan curve at regular intervals

use crate::{
    config::Config,
    curve::Curve,
    device::Device,
    errors::{FanControlError, Result},
    logging::Logger,
    scanner::Registry,
    source::DeviceSource,
    MIN_SUPPORTED_SPEED,
};
use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::mpsc, time::sleep};

/// Message written to the notification channel once the loop is ready
pub const READY_MESSAGE: &[u8] = b"READY=1\n";

/// Everything rebuilt from the configuration file on (re)load
#[derive(Debug)]
struct ControlState {
    registry: Registry,
    curve: Curve,
    threshold: Option<i32>,
    period: Duration,
}

/// Why the inter-tick wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Elapsed,
    Reload,
    Stop,
}

/// Outcome of one device's control decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The fan was set to `speed` percent
    Applied { speed: i32 },
    /// The temperature stayed inside the hysteresis band
    Held,
}

/// Whether a reading of `temp` falls inside the half-open hysteresis band
/// `[last - threshold, last + threshold)`, comparing whole degrees
pub fn within_band(temp: f32, last: f32, threshold: i32) -> bool {
    let threshold = threshold as f32;
    let low = (last - threshold) as i64;
    let high = (last + threshold) as i64;
    (low..high).contains(&(temp as i64))
}

/// Target fan speed percentage for a temperature reading
pub fn target_speed(curve: &Curve, temp: f32) -> i32 {
    let speed = curve.evaluate(temp as i32).round() as i32;
    if speed < 0 {
        // Driver workaround, unreachable with a validated curve
        MIN_SUPPORTED_SPEED
    } else {
        speed
    }
}

/// Requests delivered into a running [`Controller`]
#[derive(Debug, Clone)]
pub struct ControlHandle {
    reload: mpsc::UnboundedSender<()>,
    stop: mpsc::UnboundedSender<()>,
}

impl ControlHandle {
    /// Ask the controller to re-read its configuration
    pub fn reload(&self) {
        let _ = self.reload.send(());
    }

    /// Ask the controller to finish its current tick and return
    pub fn stop(&self) {
        let _ = self.stop.send(());
    }
}

/// Applies the fan curve to every managed card
pub struct Controller {
    config_path: PathBuf,
    source: Arc<dyn DeviceSource>,
    logger: Logger,
    state: ControlState,
    last_temps: HashMap<String, f32>,
    handle: ControlHandle,
    reload_rx: mpsc::UnboundedReceiver<()>,
    stop_rx: mpsc::UnboundedReceiver<()>,
}

impl Controller {
    /// Load the configuration and scan for cards.
    ///
    /// Fails when the configuration is invalid or no compatible card is found.
    pub fn new(
        config_path: impl Into<PathBuf>,
        source: Arc<dyn DeviceSource>,
        logger: Logger,
    ) -> Result<Self> {
        let config_path = config_path.into();
        let state = Self::load(&config_path, &source, &logger)?;

        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config_path,
            source,
            logger,
            state,
            last_temps: HashMap::new(),
            handle: ControlHandle {
                reload: reload_tx,
                stop: stop_tx,
            },
            reload_rx,
            stop_rx,
        })
    }

    fn load(path: &Path, source: &Arc<dyn DeviceSource>, logger: &Logger) -> Result<ControlState> {
        logger.info(format_args!("Loading configuration from {}", path.display()));
        let config = Config::load(path)?;

        let registry = Registry::scan(source.clone(), config.cards.as_deref(), logger);
        if registry.is_empty() {
            return Err(FanControlError::NoCompatibleDevice);
        }
        let curve = config.curve()?;

        logger.info(format_args!(
            "Configuration successfully loaded, managing {}",
            registry.ids().collect::<Vec<_>>().join(", ")
        ));

        Ok(ControlState {
            registry,
            curve,
            threshold: config.hysteresis(),
            period: config.period(),
        })
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    pub fn curve(&self) -> &Curve {
        &self.state.curve
    }

    pub fn period(&self) -> Duration {
        self.state.period
    }

    /// Temperature the card's speed was last set for
    pub fn last_temperature(&self, id: &str) -> Option<f32> {
        self.last_temps.get(id).copied()
    }

    /// Rebuild cards and curve from the configuration file.
    ///
    /// On failure the previous cards and curve stay active. Returns whether the
    /// new configuration was applied.
    pub fn reload(&mut self) -> bool {
        self.logger
            .info(format_args!("Received request to reload config"));

        match Self::load(&self.config_path, &self.source, &self.logger) {
            Ok(state) => {
                self.state = state;
                self.last_temps.clear();
                true
            }
            Err(e) => {
                self.logger.error(format_args!(
                    "Failed to reload configuration, keeping the previous one: {}",
                    e
                ));
                false
            }
        }
    }

    /// Run one control pass over every card.
    ///
    /// Per-card failures are logged and skipped; only fatal errors are returned.
    pub fn tick(&mut self) -> Result<()> {
        let state = &self.state;
        for device in state.registry.devices() {
            let last = self.last_temps.get(device.id()).copied();
            match Self::refresh(state, device, last, &self.logger) {
                Ok((Action::Applied { .. }, temp)) => {
                    self.last_temps.insert(device.id().to_string(), temp);
                }
                Ok((Action::Held, _)) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.logger
                        .warn(format_args!("{}: skipping this round: {}", device.id(), e));
                }
            }
        }
        Ok(())
    }

    fn refresh(
        state: &ControlState,
        device: &Device,
        last: Option<f32>,
        logger: &Logger,
    ) -> Result<(Action, f32)> {
        let temp = device.temperature()?;
        let speed = target_speed(&state.curve, temp);

        logger.debug(format_args!(
            "{}: temp {:.1}, last temp {}, target fan speed {}%, fan speed {} rpm",
            device.id(),
            temp,
            last.map(|t| format!("{:.1}", t))
                .unwrap_or_else(|| "-".to_string()),
            speed,
            device.fan_speed(),
        ));

        if let (Some(threshold), Some(last)) = (state.threshold, last) {
            if within_band(temp, last, threshold) {
                logger.debug(format_args!("{}: temp in range, doing nothing", device.id()));
                return Ok((Action::Held, temp));
            }
        }

        device.set_speed_percent(speed)?;
        Ok((Action::Applied { speed }, temp))
    }

    async fn wait(&mut self) -> Wake {
        tokio::select! {
            biased;
            _ = self.stop_rx.recv() => Wake::Stop,
            _ = self.reload_rx.recv() => Wake::Reload,
            _ = sleep(self.state.period) => Wake::Elapsed,
        }
    }

    /// Run the control loop until stopped through a [`ControlHandle`].
    ///
    /// `ready` receives [`READY_MESSAGE`] once, before the first tick.
    pub async fn run(mut self, ready: Option<Box<dyn Write + Send>>) -> Result<()> {
        if let Some(mut ready) = ready {
            ready.write_all(READY_MESSAGE)?;
            ready.flush()?;
        }

        self.logger.info(format_args!("Controller is running"));
        loop {
            self.tick()?;

            match self.wait().await {
                Wake::Elapsed => {}
                Wake::Reload => {
                    self.reload();
                }
                Wake::Stop => break,
            }
        }

        self.logger.info(format_args!("Stopped controller"));
        Ok(())
    }
}
