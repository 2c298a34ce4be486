//! Round-robin device status poll
//!
//! The device answers one query per tick; cycling through the status
//! queries keeps every reading fresh without ever blocking a tick on more
//! than one protocol exchange. A failed query is simply skipped; the
//! rotation has already moved on, so the same query retries a full cycle
//! later with no wedging.

use crate::evse::{EvseControl, EvseError, EvseState, ServiceLevel};
use crate::log_debug;

/// Latest polled device readings
#[derive(Debug, Clone, Copy)]
pub struct LiveData {
    pub state: EvseState,
    /// Commanded charge rate in amps
    pub charge_rate: u8,
    pub service_level: ServiceLevel,
    /// Station's own draw in amps
    pub self_consumption: f64,
}

impl Default for LiveData {
    fn default() -> Self {
        Self {
            state: EvseState::Starting,
            charge_rate: 0,
            service_level: ServiceLevel::Level2,
            self_consumption: 0.0,
        }
    }
}

/// Number of queries in the rotation
const POLL_STEPS: u8 = 4;

/// The poll rotation
pub struct StatusPoller {
    step: u8,
}

impl StatusPoller {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Run one poll step, updating the matching [`LiveData`] field.
    pub fn poll(&mut self, evse: &mut dyn EvseControl, live: &mut LiveData) -> Result<(), EvseError> {
        let step = self.step;
        // Advance before the query so a persistent failure on one query
        // cannot stall the rotation.
        self.step = (self.step + 1) % POLL_STEPS;

        let result = match step {
            0 => evse.charging_state().map(|v| live.state = v),
            1 => evse.charge_rate().map(|v| live.charge_rate = v),
            2 => evse.service_level().map(|v| live.service_level = v),
            _ => evse
                .self_consumption_current()
                .map(|v| live.self_consumption = v),
        };
        if let Err(e) = &result {
            log_debug!("status poll step {} failed: {}", step, e);
        }
        result
    }
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evse::MockEvse;

    #[test]
    fn full_cycle_refreshes_every_field() {
        let mut evse = MockEvse::new();
        evse.state = EvseState::Charging;
        evse.rate = 16;
        evse.service_level = ServiceLevel::Level1;
        evse.self_consumption = 1.5;

        let mut poller = StatusPoller::new();
        let mut live = LiveData::default();
        for _ in 0..4 {
            poller.poll(&mut evse, &mut live).unwrap();
        }

        assert_eq!(live.state, EvseState::Charging);
        assert_eq!(live.charge_rate, 16);
        assert_eq!(live.service_level, ServiceLevel::Level1);
        assert_eq!(live.self_consumption, 1.5);
    }

    #[test]
    fn failed_step_does_not_stall_rotation() {
        let mut evse = MockEvse::new();
        evse.state = EvseState::Charging;
        evse.rate = 16;

        let mut poller = StatusPoller::new();
        let mut live = LiveData::default();

        evse.fail_next();
        assert!(poller.poll(&mut evse, &mut live).is_err());
        // State query failed; the next tick polls the charge rate.
        poller.poll(&mut evse, &mut live).unwrap();
        assert_eq!(live.state, EvseState::Starting);
        assert_eq!(live.charge_rate, 16);

        // One more full cycle picks the state back up.
        for _ in 0..4 {
            let _ = poller.poll(&mut evse, &mut live);
        }
        assert_eq!(live.state, EvseState::Charging);
    }
}
