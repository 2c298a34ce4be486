//! Configuration registry
//!
//! [`ConfigStore`] owns the in-memory option values and the durable
//! storage behind them. Reads are free; writes go through [`ConfigStore::set`]
//! which validates the type, updates memory, marks the store dirty and
//! notifies the change sink. Storage is only touched by [`ConfigStore::load`],
//! [`ConfigStore::commit`] and [`ConfigStore::reset`].

use heapless::{FnvIndexMap, Vec};

use super::schema::{
    default_value, OptionDef, OptionKind, FLAGS_INDEX, MAX_OPTIONS, SCHEMA,
};
use super::value::ConfigValue;
use super::{current, legacy, ConfigError, CHARGE_MODE_MASK, CHARGE_MODE_SHIFT};
use crate::events::ConfigEvents;
use crate::platform::StorageInterface;
use crate::{log_info, log_warn};

/// Which persisted generation [`ConfigStore::load`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Generation {
    /// Current layout header present; per-field slots loaded
    Current,
    /// No current header, but the v1 fixed-offset layout validated
    Legacy,
    /// Nothing recognizable; schema defaults in effect
    Defaults,
}

/// The configuration store
///
/// Name and alias lookups share one index; both resolve to the same
/// schema entry. Capacity 64 covers 28 names plus 28 aliases.
pub struct ConfigStore<S: StorageInterface> {
    storage: S,
    values: Vec<ConfigValue, MAX_OPTIONS>,
    index: FnvIndexMap<&'static str, usize, 64>,
    dirty: bool,
}

impl<S: StorageInterface> ConfigStore<S> {
    /// Create a store holding schema defaults. Call [`load`](Self::load)
    /// to pull persisted values in.
    pub fn new(storage: S) -> Self {
        let default_flags = match SCHEMA[FLAGS_INDEX].kind {
            OptionKind::Uint { default } => default,
            _ => 0,
        };
        let values = SCHEMA
            .iter()
            .map(|def| default_value(def, default_flags))
            .collect();

        let mut index = FnvIndexMap::new();
        for (i, def) in SCHEMA.iter().enumerate() {
            // Capacity is checked against the schema at build time.
            let _ = index.insert(def.name, i);
            let _ = index.insert(def.alias, i);
        }

        Self {
            storage,
            values,
            index,
            dirty: false,
        }
    }

    /// Resolve a canonical name or alias to its schema entry
    pub fn lookup(&self, name: &str) -> Option<(usize, &'static OptionDef)> {
        let idx = *self.index.get(name)?;
        Some((idx, &SCHEMA[idx]))
    }

    /// Current packed flags word
    pub fn flags(&self) -> u32 {
        self.values[FLAGS_INDEX].as_uint().unwrap_or(0)
    }

    /// Unsaved changes pending?
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read an option by canonical name or alias.
    ///
    /// Virtual options are computed from the flags word on every read, so
    /// they can never disagree with it.
    pub fn get(&self, name: &str) -> Option<ConfigValue> {
        let (idx, def) = self.lookup(name)?;
        Some(match def.kind {
            OptionKind::VirtualBool { mask } => ConfigValue::Bool(self.flags() & mask == mask),
            OptionKind::VirtualChargeMode => {
                ConfigValue::Uint((self.flags() & CHARGE_MODE_MASK) >> CHARGE_MODE_SHIFT)
            }
            _ => self.values[idx].clone(),
        })
    }

    pub fn get_uint(&self, name: &str) -> Option<u32> {
        self.get(name)?.as_uint()
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_double()
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    /// Read a text option into a fresh buffer
    pub fn get_text(&self, name: &str) -> Option<heapless::String<{ super::MAX_TEXT_LEN }>> {
        match self.get(name)? {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Write an option by canonical name or alias.
    ///
    /// Writing a virtual option rewrites the relevant bits of the flags
    /// word; the change event then carries the name `flags`, since that
    /// is the option whose stored value moved. Every successful write
    /// fires the change sink, whether or not the value differed.
    pub fn set(
        &mut self,
        name: &str,
        value: ConfigValue,
        events: &mut dyn ConfigEvents,
    ) -> Result<(), ConfigError> {
        let (idx, def) = self.lookup(name).ok_or(ConfigError::NotFound)?;

        let event_name = match def.kind {
            OptionKind::Uint { .. } => {
                let v = value.as_uint().ok_or(ConfigError::TypeMismatch)?;
                self.values[idx] = ConfigValue::Uint(v);
                def.name
            }
            OptionKind::Double { .. } => {
                let v = value.as_double().ok_or(ConfigError::TypeMismatch)?;
                self.values[idx] = ConfigValue::Double(v);
                def.name
            }
            OptionKind::Text { capacity, .. } => {
                let s = match &value {
                    ConfigValue::Text(s) => s,
                    _ => return Err(ConfigError::TypeMismatch),
                };
                if s.len() > capacity {
                    return Err(ConfigError::ValueTooLong);
                }
                self.values[idx] = value;
                def.name
            }
            OptionKind::VirtualBool { mask } => {
                let on = value.as_bool().ok_or(ConfigError::TypeMismatch)?;
                let flags = self.flags();
                let flags = if on { flags | mask } else { flags & !mask };
                self.values[FLAGS_INDEX] = ConfigValue::Uint(flags);
                "flags"
            }
            OptionKind::VirtualChargeMode => {
                let mode = value.as_uint().ok_or(ConfigError::TypeMismatch)?;
                if mode > 7 {
                    return Err(ConfigError::TypeMismatch);
                }
                let flags =
                    (self.flags() & !CHARGE_MODE_MASK) | (mode << CHARGE_MODE_SHIFT);
                self.values[FLAGS_INDEX] = ConfigValue::Uint(flags);
                "flags"
            }
        };

        self.dirty = true;
        events.config_changed(event_name, self.flags());
        Ok(())
    }

    /// Load persisted configuration, falling back generation by
    /// generation. A legacy load leaves the store dirty so the next
    /// commit migrates the data to the current layout.
    pub fn load(&mut self) -> Result<Generation, ConfigError> {
        self.restore_defaults();

        if current::header_valid(&mut self.storage)? {
            current::load(&mut self.storage, &mut self.values)?;
            self.dirty = false;
            log_info!("config loaded (current layout)");
            return Ok(Generation::Current);
        }

        let migrated = legacy::load(&mut self.storage, &mut self.values)?;
        if migrated > 0 {
            self.dirty = true;
            log_info!("config loaded from v1 layout, {} fields migrated", migrated);
            return Ok(Generation::Legacy);
        }

        self.dirty = false;
        log_warn!("no persisted config found, using defaults");
        Ok(Generation::Defaults)
    }

    /// Persist every option to storage
    pub fn commit(&mut self) -> Result<(), ConfigError> {
        current::store(&mut self.storage, &self.values)?;
        self.dirty = false;
        Ok(())
    }

    /// Factory reset: erase storage and restore schema defaults
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.storage.erase()?;
        self.restore_defaults();
        self.dirty = false;
        log_info!("config reset to factory defaults");
        Ok(())
    }

    fn restore_defaults(&mut self) {
        let default_flags = match SCHEMA[FLAGS_INDEX].kind {
            OptionKind::Uint { default } => default,
            _ => 0,
        };
        for (i, def) in SCHEMA.iter().enumerate() {
            self.values[i] = default_value(def, default_flags);
        }
    }

    #[cfg(test)]
    pub(crate) fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{divert_enabled, SERVICE_DIVERT, SERVICE_MQTT};
    use crate::events::NullEvents;
    use crate::platform::mock::MockStorage;

    fn store() -> ConfigStore<MockStorage> {
        ConfigStore::new(MockStorage::new())
    }

    #[test]
    fn defaults_visible_before_load() {
        let cfg = store();
        assert_eq!(cfg.get_text("hostname").unwrap(), "openevse");
        assert_eq!(cfg.get_uint("mqtt_port"), Some(1883));
        assert_eq!(
            cfg.get_text("mqtt_announce_topic").unwrap(),
            "openevse/announce"
        );
        assert_eq!(cfg.get_double("divert_decay_smoothing_factor"), Some(0.05));
        assert_eq!(cfg.get_bool("divert_enabled"), Some(false));
    }

    #[test]
    fn alias_and_name_reach_same_option() {
        let mut cfg = store();
        cfg.set("hn", ConfigValue::text("garage").unwrap(), &mut NullEvents)
            .unwrap();
        assert_eq!(cfg.get_text("hostname").unwrap(), "garage");
    }

    #[test]
    fn unknown_name_rejected() {
        let mut cfg = store();
        assert_eq!(
            cfg.set("nope", ConfigValue::Uint(1), &mut NullEvents),
            Err(ConfigError::NotFound)
        );
        assert!(cfg.get("nope").is_none());
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut cfg = store();
        assert_eq!(
            cfg.set("mqtt_port", ConfigValue::text("x").unwrap(), &mut NullEvents),
            Err(ConfigError::TypeMismatch)
        );
        assert_eq!(
            cfg.set("hostname", ConfigValue::Uint(1), &mut NullEvents),
            Err(ConfigError::TypeMismatch)
        );
        // Failed writes leave the store clean.
        assert!(!cfg.is_dirty());
    }

    #[test]
    fn text_capacity_enforced() {
        let mut cfg = store();
        // ohm capacity is 10
        assert_eq!(
            cfg.set(
                "ohm",
                ConfigValue::text("12345678901").unwrap(),
                &mut NullEvents
            ),
            Err(ConfigError::ValueTooLong)
        );
        assert!(cfg
            .set("ohm", ConfigValue::text("1234567890").unwrap(), &mut NullEvents)
            .is_ok());
    }

    #[test]
    fn virtual_bool_touches_only_its_bit() {
        let mut cfg = store();
        cfg.set("flags", ConfigValue::Uint(SERVICE_MQTT), &mut NullEvents)
            .unwrap();
        cfg.set("divert_enabled", ConfigValue::Bool(true), &mut NullEvents)
            .unwrap();
        assert_eq!(cfg.flags(), SERVICE_MQTT | SERVICE_DIVERT);
        assert_eq!(cfg.get_bool("divert_enabled"), Some(true));
        assert_eq!(cfg.get_bool("mqtt_enabled"), Some(true));

        cfg.set("divert_enabled", ConfigValue::Bool(false), &mut NullEvents)
            .unwrap();
        assert!(!divert_enabled(cfg.flags()));
        assert_eq!(cfg.flags(), SERVICE_MQTT);
    }

    #[test]
    fn charge_mode_occupies_its_field() {
        let mut cfg = store();
        cfg.set("flags", ConfigValue::Uint(SERVICE_DIVERT), &mut NullEvents)
            .unwrap();
        cfg.set("charge_mode", ConfigValue::Uint(1), &mut NullEvents)
            .unwrap();
        assert_eq!(cfg.get_uint("charge_mode"), Some(1));
        assert_eq!(cfg.flags(), SERVICE_DIVERT | (1 << 10));

        cfg.set("charge_mode", ConfigValue::Uint(2), &mut NullEvents)
            .unwrap();
        assert_eq!(cfg.flags(), SERVICE_DIVERT | (2 << 10));
        assert_eq!(
            cfg.set("charge_mode", ConfigValue::Uint(8), &mut NullEvents),
            Err(ConfigError::TypeMismatch)
        );
    }

    #[test]
    fn commit_load_round_trips() {
        let mut cfg = store();
        cfg.set("ssid", ConfigValue::text("homenet").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.set("mqtt_port", ConfigValue::Uint(8883), &mut NullEvents)
            .unwrap();
        cfg.set("divert_enabled", ConfigValue::Bool(true), &mut NullEvents)
            .unwrap();
        assert!(cfg.is_dirty());
        cfg.commit().unwrap();
        assert!(!cfg.is_dirty());

        // Fresh store over the same storage bytes.
        let mut data = [0u8; 4096];
        data.copy_from_slice(cfg.storage_mut().contents(0, 4096));
        let mut storage = MockStorage::new();
        storage.patch(0, &data);

        let mut reloaded = ConfigStore::new(storage);
        assert_eq!(reloaded.load().unwrap(), Generation::Current);
        assert_eq!(reloaded.get_text("ssid").unwrap(), "homenet");
        assert_eq!(reloaded.get_uint("mqtt_port"), Some(8883));
        assert_eq!(reloaded.get_bool("divert_enabled"), Some(true));
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn load_of_blank_region_reports_defaults() {
        let mut cfg = store();
        assert_eq!(cfg.load().unwrap(), Generation::Defaults);
        assert_eq!(cfg.get_text("hostname").unwrap(), "openevse");
    }

    #[test]
    fn corrupt_field_defaults_alone_after_load() {
        let mut cfg = store();
        cfg.set("ssid", ConfigValue::text("homenet").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.set("hostname", ConfigValue::text("garage").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.commit().unwrap();

        let offset = crate::config::current::slot_offset(
            crate::config::schema::option_index("hostname"),
        );
        cfg.storage_mut().inject_corruption(offset + 6, 4);

        assert_eq!(cfg.load().unwrap(), Generation::Current);
        assert_eq!(cfg.get_text("ssid").unwrap(), "homenet");
        assert_eq!(cfg.get_text("hostname").unwrap(), "openevse");
    }

    #[test]
    fn legacy_load_matches_equivalent_current_state() {
        use crate::config::legacy::image;

        let mut buf = [0xFFu8; 1024];
        let (start, count) = image::field("ssid");
        image::put_string(&mut buf, start, count, "homenet");
        let (start, count) = image::field("mqtt_server");
        image::put_string(&mut buf, start, count, "broker.local");
        image::put_uint24(&mut buf, image::FLAGS_START, (1 << 9) | (1 << 10));
        let mut storage = MockStorage::new();
        storage.patch(0, &buf);

        let mut from_legacy = ConfigStore::new(storage);
        assert_eq!(from_legacy.load().unwrap(), Generation::Legacy);
        assert!(from_legacy.is_dirty());

        let mut from_set = store();
        from_set
            .set("ssid", ConfigValue::text("homenet").unwrap(), &mut NullEvents)
            .unwrap();
        from_set
            .set(
                "mqtt_server",
                ConfigValue::text("broker.local").unwrap(),
                &mut NullEvents,
            )
            .unwrap();
        from_set
            .set("flags", ConfigValue::Uint((1 << 9) | (1 << 10)), &mut NullEvents)
            .unwrap();

        for name in ["ssid", "mqtt_server", "flags", "divert_enabled", "charge_mode", "hostname"] {
            assert_eq!(from_legacy.get(name), from_set.get(name), "{}", name);
        }
    }

    #[test]
    fn interrupted_first_commit_keeps_written_fields() {
        let mut cfg = store();
        cfg.set("ssid", ConfigValue::text("homenet").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.set("hostname", ConfigValue::text("garage").unwrap(), &mut NullEvents)
            .unwrap();

        // Power fails after the header and the first slot land.
        cfg.storage_mut().limit_writes(2);
        assert!(cfg.commit().is_err());
        cfg.storage_mut().clear_write_limit();

        assert_eq!(cfg.load().unwrap(), Generation::Current);
        assert_eq!(cfg.get_text("ssid").unwrap(), "homenet");
        assert_eq!(cfg.get_text("hostname").unwrap(), "openevse");
    }

    #[test]
    fn interrupted_recommit_never_tears_old_fields() {
        let mut cfg = store();
        cfg.set("hostname", ConfigValue::text("garage").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.commit().unwrap();

        // Power fails before the hostname slot is rewritten.
        cfg.set("hostname", ConfigValue::text("carport").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.storage_mut().limit_writes(1);
        assert!(cfg.commit().is_err());
        cfg.storage_mut().clear_write_limit();

        // Every slot is either its old or its new value, never torn.
        assert_eq!(cfg.load().unwrap(), Generation::Current);
        assert_eq!(cfg.get_text("hostname").unwrap(), "garage");
    }

    #[test]
    fn reset_erases_and_restores_defaults() {
        let mut cfg = store();
        cfg.set("hostname", ConfigValue::text("garage").unwrap(), &mut NullEvents)
            .unwrap();
        cfg.commit().unwrap();
        cfg.reset().unwrap();

        assert_eq!(cfg.get_text("hostname").unwrap(), "openevse");
        assert_eq!(cfg.load().unwrap(), Generation::Defaults);
    }

    #[test]
    fn set_fires_change_event() {
        struct Recorder {
            last: Option<(heapless::String<32>, u32)>,
        }
        impl ConfigEvents for Recorder {
            fn config_changed(&mut self, name: &str, flags: u32) {
                self.last = Some((heapless::String::try_from(name).unwrap(), flags));
            }
        }

        let mut cfg = store();
        let mut rec = Recorder { last: None };

        cfg.set("hostname", ConfigValue::text("garage").unwrap(), &mut rec)
            .unwrap();
        assert_eq!(rec.last.as_ref().unwrap().0, "hostname");

        // Virtual writes report against the flags word they mutate.
        cfg.set("divert_enabled", ConfigValue::Bool(true), &mut rec)
            .unwrap();
        let (name, flags) = rec.last.as_ref().unwrap();
        assert_eq!(name, "flags");
        assert_eq!(*flags, SERVICE_DIVERT);
    }
}
