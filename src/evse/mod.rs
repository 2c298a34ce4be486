//! Charging controller collaborator interface
//!
//! The physical charging station is driven over a serial request/response
//! protocol by an external collaborator. This module defines the narrow
//! trait the rest of the gateway talks through, plus the shared state and
//! error vocabulary. The real transport lives behind the hardware feature
//! set; tests use [`MockEvse`].

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{EvseCommand, MockEvse};

use core::fmt;

/// Device protocol errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EvseError {
    /// No response within the protocol deadline
    Timeout,
    /// Device answered with a negative acknowledgement
    Nak,
    /// Response did not parse
    InvalidResponse,
}

impl fmt::Display for EvseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvseError::Timeout => write!(f, "device timeout"),
            EvseError::Nak => write!(f, "device NAK"),
            EvseError::InvalidResponse => write!(f, "unparseable device response"),
        }
    }
}

pub type Result<T> = core::result::Result<T, EvseError>;

/// Charging state as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EvseState {
    /// Controller still booting, state not yet known
    Starting,
    /// No vehicle plugged in
    NotConnected,
    /// Vehicle connected, not charging
    Connected,
    Charging,
    /// Any device-reported error condition
    Fault,
    /// Pilot disabled, waiting to be woken
    Sleeping,
    Disabled,
}

impl EvseState {
    /// Decode the raw state byte from the device protocol
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => EvseState::Starting,
            0x01 => EvseState::NotConnected,
            0x02 => EvseState::Connected,
            0x03 => EvseState::Charging,
            0xFE => EvseState::Sleeping,
            0xFF => EvseState::Disabled,
            _ => EvseState::Fault,
        }
    }
}

/// Supply service level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceLevel {
    Level1,
    Level2,
}

impl ServiceLevel {
    /// Nominal line voltage for current/power conversions
    pub fn nominal_voltage(self) -> f64 {
        match self {
            ServiceLevel::Level1 => 110.0,
            ServiceLevel::Level2 => 240.0,
        }
    }
}

/// Control surface of the charging station
///
/// Every call maps to one protocol exchange and can fail; callers in the
/// control path treat any failure as "skip the rest of this tick".
pub trait EvseControl {
    /// Currently commanded charge rate in amps
    fn charge_rate(&mut self) -> Result<u8>;

    /// Command a new charge rate in amps
    fn set_charge_rate(&mut self, amps: u8) -> Result<()>;

    /// Bring the device out of sleep
    fn wake(&mut self) -> Result<()>;

    /// Maximum charge current configured on the device itself
    fn configured_max(&mut self) -> Result<u8>;

    fn charging_state(&mut self) -> Result<EvseState>;

    fn service_level(&mut self) -> Result<ServiceLevel>;

    /// The station's own instantaneous draw in amps
    fn self_consumption_current(&mut self) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_state_decoding() {
        assert_eq!(EvseState::from_raw(0x00), EvseState::Starting);
        assert_eq!(EvseState::from_raw(0x01), EvseState::NotConnected);
        assert_eq!(EvseState::from_raw(0x02), EvseState::Connected);
        assert_eq!(EvseState::from_raw(0x03), EvseState::Charging);
        assert_eq!(EvseState::from_raw(0xFE), EvseState::Sleeping);
        assert_eq!(EvseState::from_raw(0xFF), EvseState::Disabled);
        assert_eq!(EvseState::from_raw(0x04), EvseState::Fault);
        assert_eq!(EvseState::from_raw(0x09), EvseState::Fault);
    }

    #[test]
    fn nominal_voltages() {
        assert_eq!(ServiceLevel::Level1.nominal_voltage(), 110.0);
        assert_eq!(ServiceLevel::Level2.nominal_voltage(), 240.0);
    }
}
