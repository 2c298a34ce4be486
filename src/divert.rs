//! Solar divert control loop
//!
//! In Eco mode the controller throttles the charge current to the surplus
//! power measured by the telemetry feeds. A grid import/export feed takes
//! priority over a solar-only feed; with neither, the target is zero and
//! the loop idles.
//!
//! Device failures never surface: a failed query or command abandons the
//! current tick and the next tick starts over from live state.

use crate::evse::{EvseControl, EvseError, EvseState};
use crate::log_info;
use crate::telemetry::Telemetry;

/// Lowest chargeable current in amps; targets below this issue no command
pub const DIVERT_MIN_CHARGE_CURRENT: u8 = 6;

/// Fallback current ceiling before the device's own maximum is learned
pub const DIVERT_MAX_CHARGE_CURRENT: u8 = 32;

/// Safety margin held back from measured grid export, in watts
pub const DIVERT_RESERVE_POWER_W: f64 = 100.0;

/// Divert operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DivertMode {
    /// Charge at the full configured rate
    Normal,
    /// Track available surplus power
    Eco,
}

/// Sink for divert mode-change notifications
pub trait DivertEvents {
    fn divert_mode_changed(&mut self, mode: DivertMode);
}

/// The divert controller
pub struct DivertController {
    mode: DivertMode,
    /// Last computed Eco target in amps
    charge_rate: u8,
    min_charge_current: u8,
    /// Ceiling learned from the device on each Eco entry
    max_charge_current: u8,
    last_state: EvseState,
}

impl DivertController {
    pub fn new() -> Self {
        Self {
            mode: DivertMode::Normal,
            charge_rate: 0,
            min_charge_current: DIVERT_MIN_CHARGE_CURRENT,
            max_charge_current: DIVERT_MAX_CHARGE_CURRENT,
            last_state: EvseState::Starting,
        }
    }

    pub fn mode(&self) -> DivertMode {
        self.mode
    }

    /// Last computed Eco charge target in amps
    pub fn charge_rate(&self) -> u8 {
        self.charge_rate
    }

    /// Switch operating mode.
    ///
    /// A request for the current mode is a complete no-op. A real
    /// transition fires exactly one event, then talks to the device:
    /// entering Normal restores the learned maximum rate, entering Eco
    /// zeroes the tracked rate and adopts the device's configured
    /// maximum as the new ceiling, so a cap set manually on the device
    /// keeps binding while diverting.
    pub fn set_mode(
        &mut self,
        requested: DivertMode,
        evse: &mut dyn EvseControl,
        events: &mut dyn DivertEvents,
    ) -> Result<(), EvseError> {
        if requested == self.mode {
            return Ok(());
        }
        log_info!(
            "divert mode -> {}",
            match requested {
                DivertMode::Normal => "normal",
                DivertMode::Eco => "eco",
            }
        );
        self.mode = requested;
        events.divert_mode_changed(requested);

        match requested {
            DivertMode::Normal => {
                evse.set_charge_rate(self.max_charge_current)?;
            }
            DivertMode::Eco => {
                self.charge_rate = 0;
                self.max_charge_current = evse.configured_max()?;
            }
        }
        Ok(())
    }

    /// Auto-revert check, run every tick independent of the control loop.
    ///
    /// Unplugging the vehicle while diverting drops back to Normal so the
    /// next session starts at full rate.
    pub fn check_vehicle(
        &mut self,
        evse: &mut dyn EvseControl,
        events: &mut dyn DivertEvents,
    ) -> Result<(), EvseError> {
        let state = evse.charging_state()?;
        let previous = core::mem::replace(&mut self.last_state, state);
        if self.mode == DivertMode::Eco
            && state == EvseState::NotConnected
            && previous != EvseState::NotConnected
        {
            self.set_mode(DivertMode::Normal, evse, events)?;
        }
        Ok(())
    }

    /// One control-loop tick. No-op outside Eco mode.
    pub fn update(
        &mut self,
        telemetry: &Telemetry,
        evse: &mut dyn EvseControl,
    ) -> Result<(), EvseError> {
        if self.mode != DivertMode::Eco {
            return Ok(());
        }

        let current_rate = evse.charge_rate()?;
        let state = evse.charging_state()?;
        let voltage = evse.service_level()?.nominal_voltage();

        let mut target = if let Some(grid_w) = telemetry.grid_ie() {
            // Negative grid power is export. Subtract the station's own
            // draw to get the current actually available to divert.
            let grid_current = grid_w as f64 / voltage;
            let export = grid_current - evse.self_consumption_current()?;
            if export < 0.0 {
                let available = -export - DIVERT_RESERVE_POWER_W / voltage;
                if available > 0.0 {
                    available as u8
                } else {
                    0
                }
            } else {
                0
            }
        } else if let Some(solar_w) = telemetry.solar() {
            // Solar-only feed carries no reserve margin.
            if solar_w > 0 {
                (solar_w as f64 / voltage) as u8
            } else {
                0
            }
        } else {
            0
        };

        let asleep = state == EvseState::Sleeping;
        if !asleep && target < self.min_charge_current {
            target = self.min_charge_current;
        }

        if target >= self.min_charge_current {
            if target > self.max_charge_current {
                target = self.max_charge_current;
            }
            self.charge_rate = target;
            if target != current_rate {
                evse.set_charge_rate(target)?;
            }
            if asleep {
                evse.wake()?;
            }
        }
        Ok(())
    }
}

impl Default for DivertController {
    fn default() -> Self {
        Self::new()
    }
}
