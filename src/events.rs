//! Change propagation from configuration writes
//!
//! Every successful [`ConfigStore::set`](crate::config::ConfigStore::set)
//! reports the written option's name here. The [`Notifier`] maps names to
//! reactions: flags changes recompute the divert mode and reconcile
//! service enablement against live connection state, MQTT and EmonCMS
//! option changes flag the respective service for restart or resend.

use crate::config::{
    charge_mode, divert_enabled, emoncms_enabled, mqtt_enabled, CHARGE_MODE_ECO,
};
use crate::divert::{DivertController, DivertEvents, DivertMode};
use crate::evse::EvseControl;
use crate::log_warn;

/// Sink for configuration change notifications
///
/// `flags` is the current packed flags word, so flag-derived reactions
/// need no read-back into the store.
pub trait ConfigEvents {
    fn config_changed(&mut self, name: &str, flags: u32);
}

/// Sink that drops every notification, for boot-time and test writes
pub struct NullEvents;

impl ConfigEvents for NullEvents {
    fn config_changed(&mut self, _name: &str, _flags: u32) {}
}

impl DivertEvents for NullEvents {
    fn divert_mode_changed(&mut self, _mode: DivertMode) {}
}

/// Divert mode implied by a flags word.
///
/// Single source of truth for every reaction path: Eco iff the divert
/// bit is set and the charge mode selects Eco.
pub fn divert_mode_for(flags: u32) -> DivertMode {
    if divert_enabled(flags) && charge_mode(flags) == CHARGE_MODE_ECO {
        DivertMode::Eco
    } else {
        DivertMode::Normal
    }
}

/// Live service connection state and pending reconnect work
///
/// The transports themselves live outside this crate; they feed the
/// `*_connected` fields and drain the pending flags on their own ticks.
#[derive(Debug, Default)]
pub struct ServiceState {
    pub mqtt_connected: bool,
    pub emoncms_connected: bool,
    mqtt_restart_pending: bool,
    emoncms_resend_pending: bool,
}

impl ServiceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag_mqtt_restart(&mut self) {
        self.mqtt_restart_pending = true;
    }

    pub fn flag_emoncms_resend(&mut self) {
        self.emoncms_resend_pending = true;
    }

    /// Consume a pending MQTT restart request
    pub fn take_mqtt_restart(&mut self) -> bool {
        core::mem::take(&mut self.mqtt_restart_pending)
    }

    /// Consume a pending EmonCMS resend request
    pub fn take_emoncms_resend(&mut self) -> bool {
        core::mem::take(&mut self.emoncms_resend_pending)
    }
}

/// The reaction table, wired to the live subsystems for one write
pub struct Notifier<'a> {
    pub divert: &'a mut DivertController,
    pub evse: &'a mut dyn EvseControl,
    pub divert_events: &'a mut dyn DivertEvents,
    pub services: &'a mut ServiceState,
}

impl Notifier<'_> {
    fn apply_divert_mode(&mut self, flags: u32) {
        let mode = divert_mode_for(flags);
        if let Err(e) = self.divert.set_mode(mode, self.evse, self.divert_events) {
            // Device trouble does not undo the config write; the next
            // flags write or tick re-reaches the device.
            log_warn!("divert mode change failed: {}", e);
        }
    }
}

impl ConfigEvents for Notifier<'_> {
    fn config_changed(&mut self, name: &str, flags: u32) {
        if name == "flags" {
            self.apply_divert_mode(flags);
            if self.services.mqtt_connected != mqtt_enabled(flags) {
                self.services.flag_mqtt_restart();
            }
            if self.services.emoncms_connected != emoncms_enabled(flags) {
                self.services.flag_emoncms_resend();
            }
        } else if name.starts_with("mqtt_") {
            self.services.flag_mqtt_restart();
        } else if name.starts_with("emoncms_") {
            self.services.flag_emoncms_resend();
        } else if name == "divert_enabled" || name == "charge_mode" {
            // Virtual writes normally surface as "flags"; this arm keeps
            // direct notifications for these names on the same formula.
            self.apply_divert_mode(flags);
        }
    }
}
