//! Configuration store
//!
//! A named, typed option registry persisted to a small durable byte
//! region. Values live in memory, mutate through [`ConfigStore::set`], and
//! reach storage only on an explicit [`ConfigStore::commit`]. Loading
//! falls back field-by-field to schema defaults on checksum failure, and
//! to the legacy fixed-offset layout when the current layout is absent,
//! so one corrupt field never invalidates the rest of the store.
//!
//! # Module layout
//!
//! - [`schema`]: the static option table and flags-word bit layout
//! - [`value`]: the tagged value type
//! - [`store`]: the registry with get/set/commit/load/reset
//! - [`current`]: current-generation persistence codec (per-field CRC slots)
//! - [`legacy`]: v1 fixed-offset codec (XOR checksums)
//! - [`json`]: JSON serialize/deserialize surface

pub mod current;
pub mod json;
pub mod legacy;
pub mod schema;
pub mod store;
pub mod value;

pub use schema::{OptionDef, OptionFlags, OptionKind, EEPROM_SIZE, SCHEMA};
pub use store::{ConfigStore, Generation};
pub use value::{ConfigValue, MAX_TEXT_LEN};

use crate::platform::PlatformError;
use core::fmt;

// Flags word bit layout. Shared across subsystems: the virtual options,
// the change notifier and external reporting all address these bits.
pub const SERVICE_EMONCMS: u32 = 1 << 0;
pub const SERVICE_MQTT: u32 = 1 << 1;
pub const SERVICE_OHM: u32 = 1 << 2;
pub const SERVICE_DIVERT: u32 = 1 << 9;
pub const CHARGE_MODE_SHIFT: u32 = 10;
pub const CHARGE_MODE_MASK: u32 = 7 << CHARGE_MODE_SHIFT;

/// Charge-mode value that selects Eco charging
pub const CHARGE_MODE_ECO: u8 = 1;

pub fn emoncms_enabled(flags: u32) -> bool {
    flags & SERVICE_EMONCMS == SERVICE_EMONCMS
}

pub fn mqtt_enabled(flags: u32) -> bool {
    flags & SERVICE_MQTT == SERVICE_MQTT
}

pub fn ohm_enabled(flags: u32) -> bool {
    flags & SERVICE_OHM == SERVICE_OHM
}

pub fn divert_enabled(flags: u32) -> bool {
    flags & SERVICE_DIVERT == SERVICE_DIVERT
}

pub fn charge_mode(flags: u32) -> u8 {
    ((flags & CHARGE_MODE_MASK) >> CHARGE_MODE_SHIFT) as u8
}

/// Configuration store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown option name
    NotFound,
    /// Value type does not match the option's declared type
    TypeMismatch,
    /// Text value exceeds the option's persistence capacity
    ValueTooLong,
    /// Output buffer too small for the serialized document
    BufferFull,
    /// Malformed JSON document
    InvalidJson,
    /// Durable storage failure
    Platform(PlatformError),
}

impl From<PlatformError> for ConfigError {
    fn from(e: PlatformError) -> Self {
        ConfigError::Platform(e)
    }
}

impl From<core::fmt::Error> for ConfigError {
    fn from(_: core::fmt::Error) -> Self {
        ConfigError::BufferFull
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound => write!(f, "unknown option"),
            ConfigError::TypeMismatch => write!(f, "value type mismatch"),
            ConfigError::ValueTooLong => write!(f, "value too long"),
            ConfigError::BufferFull => write!(f, "output buffer full"),
            ConfigError::InvalidJson => write!(f, "malformed JSON"),
            ConfigError::Platform(e) => write!(f, "{}", e),
        }
    }
}
