//! Legacy v1 persistence codec (read-only)
//!
//! Devices in the field carry a fixed-offset layout guarded by one-byte
//! XOR checksums. Strings occupy a fixed region: data bytes terminated by
//! 0x00 or 0xFF, with the checksum in the region's last byte. The flags
//! word is stored as a 24-bit big-endian integer plus checksum byte.
//!
//! Fields are validated independently; a failed checksum leaves that
//! field at its default without affecting the others. Writing this layout
//! is not supported: a legacy load marks the store dirty so the next
//! commit rewrites everything in the current layout.

use heapless::{String, Vec};

use super::schema::{option_index, MAX_OPTIONS};
use super::value::{ConfigValue, MAX_TEXT_LEN};
use super::ConfigError;
use crate::platform::StorageInterface;

/// Seed for the one-byte XOR checksums
pub(crate) const CHECKSUM_SEED: u8 = 128;

/// Legacy region footprint in bytes
pub const LEGACY_SIZE: usize = 1024;

// Fixed v1 region offsets. The gap at 96..128 held a field dropped
// before the layout froze; the flags word and API key sit past the
// string block for the same historical reason.
const ESID: (usize, usize) = (0, 32);
const EPASS: (usize, usize) = (32, 64);
const EMON_SERVER: (usize, usize) = (128, 45);
const EMON_NODE: (usize, usize) = (173, 32);
const MQTT_SERVER: (usize, usize) = (205, 45);
const MQTT_TOPIC: (usize, usize) = (250, 32);
const MQTT_USER: (usize, usize) = (282, 32);
const MQTT_PASS: (usize, usize) = (314, 64);
const MQTT_SOLAR: (usize, usize) = (378, 30);
const MQTT_GRID_IE: (usize, usize) = (408, 30);
const EMON_FINGERPRINT: (usize, usize) = (438, 60);
const WWW_USER: (usize, usize) = (498, 15);
const WWW_PASS: (usize, usize) = (513, 15);
const OHM_KEY: (usize, usize) = (528, 10);
const FLAGS: usize = 538;
const EMON_APIKEY: (usize, usize) = (542, 33);
const HOSTNAME: (usize, usize) = (575, 32);

const STRING_FIELDS: &[(&str, (usize, usize))] = &[
    ("ssid", ESID),
    ("pass", EPASS),
    ("emoncms_server", EMON_SERVER),
    ("emoncms_node", EMON_NODE),
    ("mqtt_server", MQTT_SERVER),
    ("mqtt_topic", MQTT_TOPIC),
    ("mqtt_user", MQTT_USER),
    ("mqtt_pass", MQTT_PASS),
    ("mqtt_solar", MQTT_SOLAR),
    ("mqtt_grid_ie", MQTT_GRID_IE),
    ("emoncms_fingerprint", EMON_FINGERPRINT),
    ("www_username", WWW_USER),
    ("www_password", WWW_PASS),
    ("ohm", OHM_KEY),
    ("emoncms_apikey", EMON_APIKEY),
    ("hostname", HOSTNAME),
];

/// Read one checksummed string region. `None` means the checksum failed.
fn read_string<S: StorageInterface>(
    storage: &mut S,
    start: usize,
    count: usize,
) -> Result<Option<String<MAX_TEXT_LEN>>, ConfigError> {
    let mut region = [0u8; MAX_TEXT_LEN + 1];
    storage.read(start as u32, &mut region[..count])?;

    let mut checksum = CHECKSUM_SEED;
    let mut val = String::new();
    for &c in &region[..count - 1] {
        if c == 0 || c == 0xFF {
            break;
        }
        checksum ^= c;
        // Region data is raw bytes; anything non-ASCII fails the push
        // and with it the field.
        if val.push(c as char).is_err() {
            return Ok(None);
        }
    }

    if region[count - 1] == checksum {
        Ok(Some(val))
    } else {
        Ok(None)
    }
}

/// Read the 24-bit big-endian flags word. `None` means the checksum failed.
fn read_uint24<S: StorageInterface>(
    storage: &mut S,
    start: usize,
) -> Result<Option<u32>, ConfigError> {
    let mut region = [0u8; 4];
    storage.read(start as u32, &mut region)?;

    let mut checksum = CHECKSUM_SEED;
    let mut val: u32 = 0;
    for &c in &region[..3] {
        checksum ^= c;
        val = (val << 8) | c as u32;
    }

    if region[3] == checksum {
        Ok(Some(val))
    } else {
        Ok(None)
    }
}

/// Load every v1 field that validates into `values`.
///
/// Returns the number of valid fields; zero means the region does not
/// hold a v1 image (an erased region validates nothing).
pub fn load<S: StorageInterface>(
    storage: &mut S,
    values: &mut Vec<ConfigValue, MAX_OPTIONS>,
) -> Result<usize, ConfigError> {
    let mut valid = 0;

    for &(name, (start, count)) in STRING_FIELDS {
        if let Some(s) = read_string(storage, start, count)? {
            values[option_index(name)] = ConfigValue::Text(s);
            valid += 1;
        }
    }

    if let Some(flags) = read_uint24(storage, FLAGS)? {
        values[option_index("flags")] = ConfigValue::Uint(flags);
        valid += 1;
    }

    Ok(valid)
}
