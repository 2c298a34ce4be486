//! Configuration schema
//!
//! The option set is fixed at build time: 23 concrete options plus 5
//! virtual bit-view options over the `flags` word. Each entry carries the
//! canonical name, the short alias used by the compact persistence layout,
//! the value type with its default, and a secrecy flag.
//!
//! The current-generation persistence footprint is computed from this
//! table in const context and checked against the storage capacity, so a
//! schema that no longer fits fails the build rather than the device.

use bitflags::bitflags;

use super::value::ConfigValue;
use super::{CHARGE_MODE_MASK, SERVICE_DIVERT, SERVICE_EMONCMS, SERVICE_MQTT, SERVICE_OHM};
use heapless::String;

/// Durable configuration region size in bytes
pub const EEPROM_SIZE: usize = 4096;

/// Upper bound on schema entries (fixed at startup, never resized)
pub const MAX_OPTIONS: usize = 32;

bitflags! {
    /// Option metadata flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OptionFlags: u8 {
        /// Value is suppressed by `serialize` unless secrets are requested
        const SECRET = 0b0000_0001;
    }
}

/// Option value type, default, and (for text) persistence capacity
#[derive(Debug, Clone, Copy)]
pub enum OptionKind {
    /// 32-bit unsigned integer
    Uint { default: u32 },
    /// Text with a fixed persistence capacity in bytes
    Text {
        default: &'static str,
        capacity: usize,
    },
    /// 64-bit floating point
    Double { default: f64 },
    /// Read/write view over one or more bits of the `flags` option
    VirtualBool { mask: u32 },
    /// 3-bit charge-mode sub-field of the `flags` option
    VirtualChargeMode,
}

/// One schema entry
#[derive(Debug, Clone, Copy)]
pub struct OptionDef {
    /// Canonical name (unique)
    pub name: &'static str,
    /// Short alias used by the compact persistence layout (unique)
    pub alias: &'static str,
    pub kind: OptionKind,
    pub flags: OptionFlags,
}

const fn opt(name: &'static str, alias: &'static str, kind: OptionKind) -> OptionDef {
    OptionDef {
        name,
        alias,
        kind,
        flags: OptionFlags::empty(),
    }
}

const fn secret(name: &'static str, alias: &'static str, kind: OptionKind) -> OptionDef {
    OptionDef {
        name,
        alias,
        kind,
        flags: OptionFlags::SECRET,
    }
}

/// The full option table, in persistence order
pub const SCHEMA: &[OptionDef] = &[
    // WiFi network
    opt("ssid", "ws", OptionKind::Text { default: "", capacity: 32 }),
    secret("pass", "wp", OptionKind::Text { default: "", capacity: 64 }),
    // Web server authentication (leave blank for none)
    opt("www_username", "au", OptionKind::Text { default: "", capacity: 16 }),
    secret("www_password", "ap", OptionKind::Text { default: "", capacity: 16 }),
    // Advanced settings
    opt("hostname", "hn", OptionKind::Text { default: "openevse", capacity: 32 }),
    // EmonCMS reporting
    opt(
        "emoncms_server",
        "es",
        OptionKind::Text { default: "data.openevse.com/emoncms", capacity: 45 },
    ),
    opt("emoncms_node", "en", OptionKind::Text { default: "openevse", capacity: 32 }),
    secret("emoncms_apikey", "ea", OptionKind::Text { default: "", capacity: 33 }),
    opt("emoncms_fingerprint", "ef", OptionKind::Text { default: "", capacity: 60 }),
    // MQTT
    opt("mqtt_server", "ms", OptionKind::Text { default: "emonpi", capacity: 45 }),
    opt("mqtt_port", "mpt", OptionKind::Uint { default: 1883 }),
    opt("mqtt_topic", "mt", OptionKind::Text { default: "openevse", capacity: 32 }),
    opt("mqtt_user", "mu", OptionKind::Text { default: "emonpi", capacity: 32 }),
    secret("mqtt_pass", "mp", OptionKind::Text { default: "emonpimqtt2016", capacity: 64 }),
    opt("mqtt_solar", "mo", OptionKind::Text { default: "", capacity: 30 }),
    opt(
        "mqtt_grid_ie",
        "mg",
        OptionKind::Text { default: "emon/emonpi/power1", capacity: 30 },
    ),
    opt("mqtt_vrms", "mv", OptionKind::Text { default: "emon/emonpi/vrms", capacity: 30 }),
    opt(
        "mqtt_announce_topic",
        "ma",
        OptionKind::Text { default: "openevse/announce", capacity: 45 },
    ),
    // Ohm Connect
    opt("ohm", "o", OptionKind::Text { default: "", capacity: 10 }),
    // Divert tuning (configuration surface; not consumed by the control loop)
    opt("divert_attack_smoothing_factor", "da", OptionKind::Double { default: 0.4 }),
    opt("divert_decay_smoothing_factor", "dd", OptionKind::Double { default: 0.05 }),
    opt("divert_min_charge_time", "dt", OptionKind::Uint { default: 600 }),
    // Packed service/mode flags
    opt("flags", "f", OptionKind::Uint { default: 0 }),
    // Virtual bit views
    opt("emoncms_enabled", "ee", OptionKind::VirtualBool { mask: SERVICE_EMONCMS }),
    opt("mqtt_enabled", "me", OptionKind::VirtualBool { mask: SERVICE_MQTT }),
    opt("ohm_enabled", "oe", OptionKind::VirtualBool { mask: SERVICE_OHM }),
    opt("divert_enabled", "de", OptionKind::VirtualBool { mask: SERVICE_DIVERT }),
    opt("charge_mode", "chmd", OptionKind::VirtualChargeMode),
];

/// Default value for one schema entry.
///
/// Virtual options derive their default from `default_flags` (the `flags`
/// option default) through the same bit views used at runtime.
pub fn default_value(def: &OptionDef, default_flags: u32) -> ConfigValue {
    match def.kind {
        OptionKind::Uint { default } => ConfigValue::Uint(default),
        OptionKind::Text { default, .. } => {
            ConfigValue::Text(String::try_from(default).unwrap_or_else(|_| String::new()))
        }
        OptionKind::Double { default } => ConfigValue::Double(default),
        OptionKind::VirtualBool { mask } => ConfigValue::Bool(default_flags & mask == mask),
        OptionKind::VirtualChargeMode => {
            ConfigValue::Uint((default_flags & CHARGE_MODE_MASK) >> super::CHARGE_MODE_SHIFT)
        }
    }
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Schema index of a canonical option name; fails the build if absent.
pub const fn option_index(name: &str) -> usize {
    let mut i = 0;
    while i < SCHEMA.len() {
        if str_eq(SCHEMA[i].name, name) {
            return i;
        }
        i += 1;
    }
    panic!("option name not in schema");
}

/// Schema index of the `flags` option
pub const FLAGS_INDEX: usize = option_index("flags");

// --- current-generation footprint, checked at build time ---

/// Header bytes of the current persistence layout (magic + version)
pub(crate) const LAYOUT_HEADER_LEN: usize = 8;

/// Alias key bytes per field slot
pub(crate) const SLOT_KEY_LEN: usize = 4;

/// Persisted slot size for one option (0 for virtual options)
pub(crate) const fn slot_len(kind: &OptionKind) -> usize {
    // key + u16 length + value area + CRC-32
    match kind {
        OptionKind::Uint { .. } => SLOT_KEY_LEN + 2 + 4 + 4,
        OptionKind::Double { .. } => SLOT_KEY_LEN + 2 + 8 + 4,
        OptionKind::Text { capacity, .. } => SLOT_KEY_LEN + 2 + *capacity + 4,
        OptionKind::VirtualBool { .. } | OptionKind::VirtualChargeMode => 0,
    }
}

const fn layout_len(schema: &[OptionDef]) -> usize {
    let mut total = LAYOUT_HEADER_LEN;
    let mut i = 0;
    while i < schema.len() {
        total += slot_len(&schema[i].kind);
        i += 1;
    }
    total
}

/// Total current-generation footprint in bytes
pub const CURRENT_LAYOUT_LEN: usize = layout_len(SCHEMA);

const _: () = assert!(
    CURRENT_LAYOUT_LEN <= EEPROM_SIZE,
    "configuration layout exceeds storage capacity"
);

const _: () = assert!(SCHEMA.len() <= MAX_OPTIONS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_aliases_unique() {
        for (i, a) in SCHEMA.iter().enumerate() {
            for b in &SCHEMA[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.alias, b.alias);
            }
        }
    }

    #[test]
    fn aliases_fit_slot_key() {
        for def in SCHEMA {
            assert!(def.alias.len() <= SLOT_KEY_LEN, "{}", def.alias);
        }
    }

    #[test]
    fn text_defaults_fit_capacity() {
        for def in SCHEMA {
            if let OptionKind::Text { default, capacity } = def.kind {
                assert!(default.len() <= capacity, "{}", def.name);
                assert!(capacity <= crate::config::value::MAX_TEXT_LEN, "{}", def.name);
            }
        }
    }

    #[test]
    fn flags_index_resolves() {
        assert_eq!(SCHEMA[FLAGS_INDEX].name, "flags");
        assert_eq!(option_index("ssid"), 0);
    }

    #[test]
    fn layout_fits_storage() {
        assert!(CURRENT_LAYOUT_LEN <= EEPROM_SIZE);
    }

    #[test]
    fn virtual_defaults_follow_flags() {
        let de = &SCHEMA[option_index("divert_enabled")];
        assert_eq!(default_value(de, 0), ConfigValue::Bool(false));
        assert_eq!(default_value(de, SERVICE_DIVERT), ConfigValue::Bool(true));

        let chmd = &SCHEMA[option_index("charge_mode")];
        assert_eq!(default_value(chmd, 1 << 10), ConfigValue::Uint(1));
    }
}
