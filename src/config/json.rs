//! JSON surface for the configuration store
//!
//! A flat object in, a flat object out. Serialization writes into a
//! caller-supplied buffer with no allocation; deserialization is a single
//! forward scan that applies fields as it parses them. Nested objects and
//! arrays are not part of the surface and are rejected.

use heapless::String;

use super::schema::{default_value, OptionDef, OptionFlags, OptionKind, SCHEMA};
use super::store::ConfigStore;
use super::value::{ConfigValue, MAX_TEXT_LEN};
use super::ConfigError;
use crate::events::ConfigEvents;
use crate::log_debug;
use crate::platform::StorageInterface;
use core::fmt::Write as _;

/// Serialization options
#[derive(Debug, Clone, Copy)]
pub struct SerializeOpts {
    /// Use canonical names; `false` emits the short aliases
    pub long_names: bool,
    /// Omit options still at their schema default
    pub compact: bool,
    /// Omit secret options entirely
    pub hide_secrets: bool,
}

impl Default for SerializeOpts {
    fn default() -> Self {
        Self {
            long_names: true,
            compact: false,
            hide_secrets: true,
        }
    }
}

fn write_escaped<const N: usize>(out: &mut String<N>, s: &str) -> Result<(), ConfigError> {
    out.push('"').map_err(|_| ConfigError::BufferFull)?;
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\"").map_err(|_| ConfigError::BufferFull)?,
            '\\' => out.push_str("\\\\").map_err(|_| ConfigError::BufferFull)?,
            '\n' => out.push_str("\\n").map_err(|_| ConfigError::BufferFull)?,
            '\r' => out.push_str("\\r").map_err(|_| ConfigError::BufferFull)?,
            '\t' => out.push_str("\\t").map_err(|_| ConfigError::BufferFull)?,
            c if (c as u32) < 0x20 => {
                write!(out, "\\u{:04x}", c as u32)?;
            }
            c => out.push(c).map_err(|_| ConfigError::BufferFull)?,
        }
    }
    out.push('"').map_err(|_| ConfigError::BufferFull)?;
    Ok(())
}

fn write_value<const N: usize>(out: &mut String<N>, value: &ConfigValue) -> Result<(), ConfigError> {
    match value {
        ConfigValue::Uint(v) => write!(out, "{}", v)?,
        ConfigValue::Double(v) => write!(out, "{}", v)?,
        ConfigValue::Bool(v) => write!(out, "{}", v)?,
        ConfigValue::Text(s) => write_escaped(out, s)?,
    }
    Ok(())
}

impl<S: StorageInterface> ConfigStore<S> {
    /// Serialize the store as a flat JSON object into `out`.
    pub fn serialize<const N: usize>(
        &self,
        out: &mut String<N>,
        opts: SerializeOpts,
    ) -> Result<(), ConfigError> {
        let default_flags = match SCHEMA[super::schema::FLAGS_INDEX].kind {
            OptionKind::Uint { default } => default,
            _ => 0,
        };

        out.push('{').map_err(|_| ConfigError::BufferFull)?;
        let mut first = true;
        for def in SCHEMA {
            if opts.hide_secrets && def.flags.contains(OptionFlags::SECRET) {
                continue;
            }
            // get() cannot fail for a schema name
            let value = self.get(def.name).ok_or(ConfigError::NotFound)?;
            if opts.compact && value == default_value(def, default_flags) {
                continue;
            }

            if !first {
                out.push(',').map_err(|_| ConfigError::BufferFull)?;
            }
            first = false;

            let key = if opts.long_names { def.name } else { def.alias };
            write_escaped(out, key)?;
            out.push(':').map_err(|_| ConfigError::BufferFull)?;
            write_value(out, &value)?;
        }
        out.push('}').map_err(|_| ConfigError::BufferFull)?;
        Ok(())
    }

    /// Apply a flat JSON object to the store.
    ///
    /// Keys may be canonical names or aliases. Unknown keys are skipped,
    /// as are known keys whose value does not fit the option (wrong type
    /// or over capacity), so one bad field never blocks the rest of a
    /// document. Change events fire per applied field through `set`.
    /// Returns the number of fields applied.
    pub fn deserialize(
        &mut self,
        json: &str,
        events: &mut dyn ConfigEvents,
    ) -> Result<usize, ConfigError> {
        let mut scan = Scanner::new(json);
        let mut applied = 0;

        scan.skip_ws();
        scan.expect('{')?;
        scan.skip_ws();
        if scan.eat('}') {
            return Ok(applied);
        }

        loop {
            scan.skip_ws();
            let key = scan.string()?;
            scan.skip_ws();
            scan.expect(':')?;
            scan.skip_ws();

            let def = self.lookup(key.as_str()).map(|(_, d)| d);
            let value = scan.value(def)?;
            match (def, value) {
                (Some(def), Some(value)) => {
                    match self.set(def.name, value, events) {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            log_debug!("config field '{}' not applied: {}", def.name, e);
                        }
                    }
                }
                _ => {
                    log_debug!("config field '{}' skipped", key.as_str());
                }
            }

            scan.skip_ws();
            if scan.eat(',') {
                continue;
            }
            scan.expect('}')?;
            return Ok(applied);
        }
    }
}

/// Forward-only scanner over a flat JSON object
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ConfigError> {
        if self.eat(want) {
            Ok(())
        } else {
            Err(ConfigError::InvalidJson)
        }
    }

    /// Parse a quoted string with standard escapes
    fn string(&mut self) -> Result<String<MAX_TEXT_LEN>, ConfigError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or(ConfigError::InvalidJson)?;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let esc = self.bump().ok_or(ConfigError::InvalidJson)?;
                    let decoded = match esc {
                        '"' => '"',
                        '\\' => '\\',
                        '/' => '/',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        'b' => '\u{8}',
                        'f' => '\u{c}',
                        'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let h = self.bump().ok_or(ConfigError::InvalidJson)?;
                                code = code * 16
                                    + h.to_digit(16).ok_or(ConfigError::InvalidJson)?;
                            }
                            char::from_u32(code).ok_or(ConfigError::InvalidJson)?
                        }
                        _ => return Err(ConfigError::InvalidJson),
                    };
                    out.push(decoded).map_err(|_| ConfigError::ValueTooLong)?;
                }
                c => out.push(c).map_err(|_| ConfigError::ValueTooLong)?,
            }
        }
    }

    /// Parse one value. `def` picks the numeric representation; `None`
    /// still consumes the value so unknown keys can be skipped.
    fn value(&mut self, def: Option<&OptionDef>) -> Result<Option<ConfigValue>, ConfigError> {
        match self.peek().ok_or(ConfigError::InvalidJson)? {
            '"' => {
                let s = self.string()?;
                Ok(Some(ConfigValue::Text(s)))
            }
            't' => {
                self.keyword("true")?;
                Ok(Some(ConfigValue::Bool(true)))
            }
            'f' => {
                self.keyword("false")?;
                Ok(Some(ConfigValue::Bool(false)))
            }
            'n' => {
                self.keyword("null")?;
                Ok(None)
            }
            '{' | '[' => Err(ConfigError::InvalidJson),
            _ => {
                let text = self.number_text()?;
                if matches!(def.map(|d| &d.kind), Some(OptionKind::Double { .. })) {
                    let v: f64 = text.parse().map_err(|_| ConfigError::InvalidJson)?;
                    return Ok(Some(ConfigValue::Double(v)));
                }
                if let Ok(v) = text.parse::<u32>() {
                    return Ok(Some(ConfigValue::Uint(v)));
                }
                // Negative or fractional numbers are still well-formed
                // JSON; carry them as a double so only the one field they
                // address gets rejected, not the whole document.
                let v: f64 = text.parse().map_err(|_| ConfigError::InvalidJson)?;
                Ok(Some(ConfigValue::Double(v)))
            }
        }
    }

    fn keyword(&mut self, word: &str) -> Result<(), ConfigError> {
        if let Some(rest) = self.rest.strip_prefix(word) {
            self.rest = rest;
            Ok(())
        } else {
            Err(ConfigError::InvalidJson)
        }
    }

    fn number_text(&mut self) -> Result<&'a str, ConfigError> {
        let end = self
            .rest
            .find(|c: char| !matches!(c, '0'..='9' | '-' | '+' | '.' | 'e' | 'E'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(ConfigError::InvalidJson);
        }
        let (num, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SERVICE_DIVERT;
    use crate::events::NullEvents;
    use crate::platform::mock::MockStorage;

    fn store() -> ConfigStore<MockStorage> {
        ConfigStore::new(MockStorage::new())
    }

    #[test]
    fn deserialize_applies_fields_and_counts() {
        let mut cfg = store();
        let n = cfg
            .deserialize(
                r#"{"ssid":"homenet","mqtt_port":8883,"divert_enabled":true}"#,
                &mut NullEvents,
            )
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(cfg.get_text("ssid").unwrap(), "homenet");
        assert_eq!(cfg.get_uint("mqtt_port"), Some(8883));
        assert_eq!(cfg.flags() & SERVICE_DIVERT, SERVICE_DIVERT);
    }

    #[test]
    fn aliases_accepted() {
        let mut cfg = store();
        cfg.deserialize(r#"{"hn":"garage","chmd":1}"#, &mut NullEvents)
            .unwrap();
        assert_eq!(cfg.get_text("hostname").unwrap(), "garage");
        assert_eq!(cfg.get_uint("charge_mode"), Some(1));
    }

    #[test]
    fn unknown_and_bad_fields_skipped() {
        let mut cfg = store();
        let n = cfg
            .deserialize(
                r#"{"not_an_option":5,"mqtt_port":"oops","hostname":"garage"}"#,
                &mut NullEvents,
            )
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(cfg.get_text("hostname").unwrap(), "garage");
        assert_eq!(cfg.get_uint("mqtt_port"), Some(1883));
    }

    #[test]
    fn negative_number_on_unknown_key_does_not_block_document() {
        let mut cfg = store();
        let n = cfg
            .deserialize(
                r#"{"not_an_option":-5,"hostname":"garage"}"#,
                &mut NullEvents,
            )
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(cfg.get_text("hostname").unwrap(), "garage");
    }

    #[test]
    fn fractional_number_on_uint_key_skips_that_field_only() {
        let mut cfg = store();
        let n = cfg
            .deserialize(
                r#"{"mqtt_port":1.5,"hostname":"garage"}"#,
                &mut NullEvents,
            )
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(cfg.get_uint("mqtt_port"), Some(1883));
        assert_eq!(cfg.get_text("hostname").unwrap(), "garage");
    }

    #[test]
    fn doubles_parse_for_double_options() {
        let mut cfg = store();
        cfg.deserialize(
            r#"{"divert_attack_smoothing_factor":0.25}"#,
            &mut NullEvents,
        )
        .unwrap();
        assert_eq!(cfg.get_double("divert_attack_smoothing_factor"), Some(0.25));
    }

    #[test]
    fn malformed_document_rejected() {
        let mut cfg = store();
        assert_eq!(
            cfg.deserialize(r#"{"ssid""#, &mut NullEvents),
            Err(ConfigError::InvalidJson)
        );
        assert_eq!(
            cfg.deserialize(r#"["ssid"]"#, &mut NullEvents),
            Err(ConfigError::InvalidJson)
        );
        assert_eq!(
            cfg.deserialize(r#"{"ssid":{}}"#, &mut NullEvents),
            Err(ConfigError::InvalidJson)
        );
    }

    #[test]
    fn empty_object_is_a_noop() {
        let mut cfg = store();
        assert_eq!(cfg.deserialize("{}", &mut NullEvents).unwrap(), 0);
        assert_eq!(cfg.deserialize("  { }  ", &mut NullEvents).unwrap(), 0);
    }

    #[test]
    fn string_escapes_round_trip() {
        let mut cfg = store();
        cfg.deserialize(r#"{"pass":"a\"b\\c\nd"}"#, &mut NullEvents)
            .unwrap();
        assert_eq!(cfg.get_text("pass").unwrap(), "a\"b\\c\nd");

        let mut out: String<2048> = String::new();
        cfg.serialize(
            &mut out,
            SerializeOpts {
                long_names: true,
                compact: true,
                hide_secrets: false,
            },
        )
        .unwrap();
        assert_eq!(out.as_str(), r#"{"pass":"a\"b\\c\nd"}"#);
    }

    #[test]
    fn secrets_hidden_by_default() {
        let mut cfg = store();
        cfg.deserialize(
            r#"{"pass":"hunter2","ssid":"homenet"}"#,
            &mut NullEvents,
        )
        .unwrap();

        let mut out: String<2048> = String::new();
        cfg.serialize(&mut out, SerializeOpts::default()).unwrap();
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("\"pass\""));
        assert!(out.contains(r#""ssid":"homenet""#));
    }

    #[test]
    fn compact_omits_defaults() {
        let mut cfg = store();
        cfg.deserialize(r#"{"mqtt_port":8883}"#, &mut NullEvents)
            .unwrap();

        let mut out: String<2048> = String::new();
        cfg.serialize(
            &mut out,
            SerializeOpts {
                long_names: true,
                compact: true,
                hide_secrets: true,
            },
        )
        .unwrap();
        assert_eq!(out.as_str(), r#"{"mqtt_port":8883}"#);
    }

    #[test]
    fn short_names_emit_aliases() {
        let mut cfg = store();
        cfg.deserialize(r#"{"hostname":"garage"}"#, &mut NullEvents)
            .unwrap();

        let mut out: String<2048> = String::new();
        cfg.serialize(
            &mut out,
            SerializeOpts {
                long_names: false,
                compact: true,
                hide_secrets: true,
            },
        )
        .unwrap();
        assert_eq!(out.as_str(), r#"{"hn":"garage"}"#);
    }

    #[test]
    fn full_document_round_trips_through_json() {
        let mut cfg = store();
        cfg.deserialize(
            r#"{"ssid":"homenet","mqtt_port":8883,"divert_enabled":true,"charge_mode":1}"#,
            &mut NullEvents,
        )
        .unwrap();

        let mut out: String<2048> = String::new();
        cfg.serialize(
            &mut out,
            SerializeOpts {
                long_names: true,
                compact: false,
                hide_secrets: false,
            },
        )
        .unwrap();

        let mut other = store();
        other.deserialize(out.as_str(), &mut NullEvents).unwrap();
        assert_eq!(other.get_text("ssid").unwrap(), "homenet");
        assert_eq!(other.get_uint("mqtt_port"), Some(8883));
        assert_eq!(other.flags(), cfg.flags());
    }
}
