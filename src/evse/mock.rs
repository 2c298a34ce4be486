//! Mock charging controller for testing
//!
//! Scripted state plus a command log. Tests set the reported fields
//! directly and assert on the commands the code under test issued.

use heapless::Vec;

use super::{EvseControl, EvseError, EvseState, Result, ServiceLevel};

/// A command issued to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvseCommand {
    SetChargeRate(u8),
    Wake,
}

/// In-memory mock of the charging station
pub struct MockEvse {
    pub state: EvseState,
    pub rate: u8,
    pub configured_max: u8,
    pub service_level: ServiceLevel,
    pub self_consumption: f64,
    /// Commands issued, in order
    pub commands: Vec<EvseCommand, 16>,
    fail_next: bool,
}

impl MockEvse {
    pub fn new() -> Self {
        Self {
            state: EvseState::Connected,
            rate: 0,
            configured_max: 32,
            service_level: ServiceLevel::Level2,
            self_consumption: 0.0,
            commands: Vec::new(),
            fail_next: false,
        }
    }

    /// Make the next protocol exchange fail with a timeout
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    fn check(&mut self) -> Result<()> {
        if self.fail_next {
            self.fail_next = false;
            return Err(EvseError::Timeout);
        }
        Ok(())
    }
}

impl Default for MockEvse {
    fn default() -> Self {
        Self::new()
    }
}

impl EvseControl for MockEvse {
    fn charge_rate(&mut self) -> Result<u8> {
        self.check()?;
        Ok(self.rate)
    }

    fn set_charge_rate(&mut self, amps: u8) -> Result<()> {
        self.check()?;
        self.rate = amps;
        let _ = self.commands.push(EvseCommand::SetChargeRate(amps));
        Ok(())
    }

    fn wake(&mut self) -> Result<()> {
        self.check()?;
        if self.state == EvseState::Sleeping {
            self.state = EvseState::Connected;
        }
        let _ = self.commands.push(EvseCommand::Wake);
        Ok(())
    }

    fn configured_max(&mut self) -> Result<u8> {
        self.check()?;
        Ok(self.configured_max)
    }

    fn charging_state(&mut self) -> Result<EvseState> {
        self.check()?;
        Ok(self.state)
    }

    fn service_level(&mut self) -> Result<ServiceLevel> {
        self.check()?;
        Ok(self.service_level)
    }

    fn self_consumption_current(&mut self) -> Result<f64> {
        self.check()?;
        Ok(self.self_consumption)
    }
}
