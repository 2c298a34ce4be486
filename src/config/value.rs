//! Configuration value types

use heapless::String;

/// Maximum text value length across the schema
pub const MAX_TEXT_LEN: usize = 64;

/// A configuration option value
///
/// `Bool` only appears on the virtual bit-view options; the backing storage
/// for those is the `flags` word.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// 32-bit unsigned integer
    Uint(u32),
    /// Text value (per-option capacity enforced by the schema)
    Text(String<MAX_TEXT_LEN>),
    /// 64-bit floating point
    Double(f64),
    /// Boolean (virtual bit-view options only)
    Bool(bool),
}

impl ConfigValue {
    /// Build a text value, truncating nothing: oversized input is rejected.
    pub fn text(s: &str) -> Option<Self> {
        String::try_from(s).ok().map(ConfigValue::Text)
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            ConfigValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ConfigValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<u32> for ConfigValue {
    fn from(v: u32) -> Self {
        ConfigValue::Uint(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Double(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}
