//! Top-level control flow
//!
//! One cooperative logical thread owns every piece of mutable state. Each
//! tick runs, in order, one step of the round-robin status poll, the
//! divert control loop, and the vehicle auto-revert check. Configuration
//! writes arrive between ticks (from the web or MQTT surfaces on the full
//! device) and propagate through the [`Notifier`] reaction table before
//! the next tick runs, so reactions and the control loop never interleave.

use crate::config::json::SerializeOpts;
use crate::config::{ConfigError, ConfigStore, ConfigValue, Generation};
use crate::divert::{DivertController, DivertEvents};
use crate::events::{divert_mode_for, Notifier, ServiceState};
use crate::evse::EvseControl;
use crate::input::{LiveData, StatusPoller};
use crate::platform::StorageInterface;
use crate::telemetry::Telemetry;
use crate::{log_debug, log_info};

/// The gateway core
pub struct Gateway<S: StorageInterface> {
    pub config: ConfigStore<S>,
    pub divert: DivertController,
    pub telemetry: Telemetry,
    pub services: ServiceState,
    pub live: LiveData,
    poller: StatusPoller,
}

impl<S: StorageInterface> Gateway<S> {
    pub fn new(storage: S) -> Self {
        Self {
            config: ConfigStore::new(storage),
            divert: DivertController::new(),
            telemetry: Telemetry::new(),
            services: ServiceState::new(),
            live: LiveData::default(),
            poller: StatusPoller::new(),
        }
    }

    /// Load persisted configuration and bring the controller in line
    /// with it. A legacy image is committed back immediately so the
    /// device only ever migrates once.
    pub fn boot(
        &mut self,
        evse: &mut dyn EvseControl,
        divert_events: &mut dyn DivertEvents,
    ) -> Result<Generation, ConfigError> {
        let generation = self.config.load()?;
        if generation == Generation::Legacy {
            self.config.commit()?;
            log_info!("legacy config migrated to current layout");
        }

        let mode = divert_mode_for(self.config.flags());
        if let Err(e) = self.divert.set_mode(mode, evse, divert_events) {
            // Device may still be booting; the mode re-applies on the
            // next flags write and the loop stays in Normal until then.
            log_debug!("initial divert mode not applied: {}", e);
        }
        Ok(generation)
    }

    /// One scheduler tick: poll, control loop, auto-revert.
    ///
    /// Device failures are dropped here; every sub-step retries on a
    /// later tick from live state.
    pub fn tick(&mut self, evse: &mut dyn EvseControl, divert_events: &mut dyn DivertEvents) {
        let _ = self.poller.poll(evse, &mut self.live);
        if let Err(e) = self.divert.update(&self.telemetry, evse) {
            log_debug!("divert tick abandoned: {}", e);
        }
        if let Err(e) = self.divert.check_vehicle(evse, divert_events) {
            log_debug!("vehicle check failed: {}", e);
        }
    }

    /// Write one option and run its reactions
    pub fn set_config(
        &mut self,
        name: &str,
        value: ConfigValue,
        evse: &mut dyn EvseControl,
        divert_events: &mut dyn DivertEvents,
    ) -> Result<(), ConfigError> {
        let mut notifier = Notifier {
            divert: &mut self.divert,
            evse,
            divert_events,
            services: &mut self.services,
        };
        self.config.set(name, value, &mut notifier)
    }

    /// Apply a JSON document and run reactions per applied field
    pub fn apply_config_json(
        &mut self,
        json: &str,
        evse: &mut dyn EvseControl,
        divert_events: &mut dyn DivertEvents,
    ) -> Result<usize, ConfigError> {
        let mut notifier = Notifier {
            divert: &mut self.divert,
            evse,
            divert_events,
            services: &mut self.services,
        };
        self.config.deserialize(json, &mut notifier)
    }

    /// Serialize the configuration for an external surface
    pub fn config_json<const N: usize>(
        &self,
        out: &mut heapless::String<N>,
        opts: SerializeOpts,
    ) -> Result<(), ConfigError> {
        self.config.serialize(out, opts)
    }

    pub fn commit_config(&mut self) -> Result<(), ConfigError> {
        self.config.commit()
    }

    pub fn factory_reset(&mut self) -> Result<(), ConfigError> {
        self.config.reset()
    }
}

/// Scheduler period for the embedded run loop
#[cfg(feature = "embassy")]
pub const TICK_PERIOD_MS: u64 = 1000;

/// Run the gateway forever on the embassy executor, one tick per period.
#[cfg(feature = "embassy")]
pub async fn run<S: StorageInterface>(
    gateway: &mut Gateway<S>,
    evse: &mut dyn EvseControl,
    divert_events: &mut dyn DivertEvents,
) -> ! {
    let mut ticker =
        embassy_time::Ticker::every(embassy_time::Duration::from_millis(TICK_PERIOD_MS));
    loop {
        gateway.tick(evse, divert_events);
        ticker.next().await;
    }
}
