//! Telemetry feed values
//!
//! Latest readings from the external power feeds (MQTT topics on the full
//! device). `None` means the feed is unconfigured or has not delivered a
//! value yet; the control loop treats that as "no surplus available"
//! rather than an error.

/// Latest values from the configured telemetry feeds
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry {
    /// Solar generation in watts
    solar: Option<i32>,
    /// Grid import/export in watts, negative while exporting
    grid_ie: Option<i32>,
    /// Measured line voltage, informational only
    voltage: Option<f64>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_solar(&mut self, watts: i32) {
        self.solar = Some(watts);
    }

    pub fn update_grid_ie(&mut self, watts: i32) {
        self.grid_ie = Some(watts);
    }

    pub fn update_voltage(&mut self, volts: f64) {
        self.voltage = Some(volts);
    }

    pub fn solar(&self) -> Option<i32> {
        self.solar
    }

    pub fn grid_ie(&self) -> Option<i32> {
        self.grid_ie
    }

    pub fn voltage(&self) -> Option<f64> {
        self.voltage
    }

    /// Forget all feed values, as on a feed reconfiguration
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
