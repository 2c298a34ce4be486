//! Current-generation persistence codec
//!
//! Layout: an 8-byte header (magic + version) followed by one fixed-size
//! slot per concrete option, in schema order. Virtual options occupy no
//! storage. Each slot is independently checksummed and written with a
//! single storage write, so an interrupted commit leaves every slot
//! either old or new, never torn across fields.
//!
//! Slot layout:
//!
//! ```text
//! [alias: 4 bytes, null padded][len: u16 LE][value area][CRC-32: u32 LE]
//! ```
//!
//! The CRC (ISO-HDLC) covers the alias, the length, and the first `len`
//! bytes of the value area. Padding beyond `len` is excluded so stale
//! bytes from a longer previous value cannot invalidate the slot.

use heapless::{String, Vec};

use super::schema::{
    slot_len, OptionDef, OptionKind, LAYOUT_HEADER_LEN, MAX_OPTIONS, SCHEMA, SLOT_KEY_LEN,
};
use super::value::{ConfigValue, MAX_TEXT_LEN};
use super::ConfigError;
use crate::log_warn;
use crate::platform::StorageInterface;

/// Layout magic, first 4 bytes of the region
pub const LAYOUT_MAGIC: [u8; 4] = *b"EVC2";

/// Layout version, next 4 bytes (u32 LE)
pub const LAYOUT_VERSION: u32 = 2;

/// Largest slot in the schema (text capacity 64)
const MAX_SLOT_LEN: usize = SLOT_KEY_LEN + 2 + MAX_TEXT_LEN + 4;

fn crc32(data: &[u8]) -> u32 {
    crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(data)
}

/// Byte offset of the slot for schema index `idx`
pub(crate) fn slot_offset(idx: usize) -> usize {
    let mut offset = LAYOUT_HEADER_LEN;
    for def in &SCHEMA[..idx] {
        offset += slot_len(&def.kind);
    }
    offset
}

/// Check whether the region carries a valid current-generation header
pub fn header_valid<S: StorageInterface>(storage: &mut S) -> Result<bool, ConfigError> {
    let mut header = [0u8; LAYOUT_HEADER_LEN];
    storage.read(0, &mut header)?;
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Ok(header[..4] == LAYOUT_MAGIC && version == LAYOUT_VERSION)
}

fn write_header<S: StorageInterface>(storage: &mut S) -> Result<(), ConfigError> {
    let mut header = [0u8; LAYOUT_HEADER_LEN];
    header[..4].copy_from_slice(&LAYOUT_MAGIC);
    header[4..].copy_from_slice(&LAYOUT_VERSION.to_le_bytes());
    storage.write(0, &header)?;
    Ok(())
}

/// Encoded value bytes and fixed value-area size for one option
fn encode_value(def: &OptionDef, value: &ConfigValue) -> Option<(Vec<u8, MAX_TEXT_LEN>, usize)> {
    let mut bytes = Vec::new();
    let area = match (&def.kind, value) {
        (OptionKind::Uint { .. }, ConfigValue::Uint(v)) => {
            bytes.extend_from_slice(&v.to_le_bytes()).ok()?;
            4
        }
        (OptionKind::Double { .. }, ConfigValue::Double(v)) => {
            bytes.extend_from_slice(&v.to_bits().to_le_bytes()).ok()?;
            8
        }
        (OptionKind::Text { capacity, .. }, ConfigValue::Text(s)) => {
            bytes.extend_from_slice(s.as_bytes()).ok()?;
            *capacity
        }
        _ => return None,
    };
    Some((bytes, area))
}

/// Write every concrete option to storage, one slot per write.
///
/// The header goes first so a fresh region becomes recognizable before
/// any field lands; field slots then land in schema order.
pub fn store<S: StorageInterface>(
    storage: &mut S,
    values: &[ConfigValue],
) -> Result<(), ConfigError> {
    write_header(storage)?;

    for (idx, def) in SCHEMA.iter().enumerate() {
        let field_len = slot_len(&def.kind);
        if field_len == 0 {
            continue;
        }
        let (bytes, area) = encode_value(def, &values[idx]).ok_or(ConfigError::TypeMismatch)?;

        let mut slot = [0u8; MAX_SLOT_LEN];
        slot[..def.alias.len()].copy_from_slice(def.alias.as_bytes());
        slot[SLOT_KEY_LEN..SLOT_KEY_LEN + 2].copy_from_slice(&(bytes.len() as u16).to_le_bytes());
        slot[SLOT_KEY_LEN + 2..SLOT_KEY_LEN + 2 + bytes.len()].copy_from_slice(&bytes);

        let crc = crc32(&slot[..SLOT_KEY_LEN + 2 + bytes.len()]);
        let crc_at = SLOT_KEY_LEN + 2 + area;
        slot[crc_at..crc_at + 4].copy_from_slice(&crc.to_le_bytes());

        storage.write(slot_offset(idx) as u32, &slot[..field_len])?;
    }
    Ok(())
}

/// Decode one slot into its value; `None` means the slot failed validation.
fn decode_slot(def: &OptionDef, slot: &[u8]) -> Option<ConfigValue> {
    let mut key = [0u8; SLOT_KEY_LEN];
    key[..def.alias.len()].copy_from_slice(def.alias.as_bytes());
    if slot[..SLOT_KEY_LEN] != key {
        return None;
    }

    let len = u16::from_le_bytes([slot[SLOT_KEY_LEN], slot[SLOT_KEY_LEN + 1]]) as usize;
    let area = match def.kind {
        OptionKind::Uint { .. } => 4,
        OptionKind::Double { .. } => 8,
        OptionKind::Text { capacity, .. } => capacity,
        _ => return None,
    };
    if len > area {
        return None;
    }

    let value = &slot[SLOT_KEY_LEN + 2..SLOT_KEY_LEN + 2 + len];
    let stored_crc = {
        let at = SLOT_KEY_LEN + 2 + area;
        u32::from_le_bytes([slot[at], slot[at + 1], slot[at + 2], slot[at + 3]])
    };
    if crc32(&slot[..SLOT_KEY_LEN + 2 + len]) != stored_crc {
        return None;
    }

    match def.kind {
        OptionKind::Uint { .. } => {
            if len != 4 {
                return None;
            }
            Some(ConfigValue::Uint(u32::from_le_bytes([
                value[0], value[1], value[2], value[3],
            ])))
        }
        OptionKind::Double { .. } => {
            if len != 8 {
                return None;
            }
            let mut bits = [0u8; 8];
            bits.copy_from_slice(value);
            Some(ConfigValue::Double(f64::from_bits(u64::from_le_bytes(bits))))
        }
        OptionKind::Text { .. } => {
            let s = core::str::from_utf8(value).ok()?;
            Some(ConfigValue::Text(String::try_from(s).ok()?))
        }
        _ => None,
    }
}

/// Load every concrete option from storage into `values`.
///
/// Validation failures are per-field: a slot that fails its checksum
/// keeps whatever `values` already holds (the schema default), and the
/// remaining slots still load. Returns the number of valid fields.
pub fn load<S: StorageInterface>(
    storage: &mut S,
    values: &mut Vec<ConfigValue, MAX_OPTIONS>,
) -> Result<usize, ConfigError> {
    let mut valid = 0;
    for (idx, def) in SCHEMA.iter().enumerate() {
        let field_len = slot_len(&def.kind);
        if field_len == 0 {
            continue;
        }
        let mut slot = [0u8; MAX_SLOT_LEN];
        storage.read(slot_offset(idx) as u32, &mut slot[..field_len])?;
        match decode_slot(def, &slot[..field_len]) {
            Some(value) => {
                values[idx] = value;
                valid += 1;
            }
            None => {
                log_warn!("config field '{}' failed validation, using default", def.name);
            }
        }
    }
    Ok(valid)
}
