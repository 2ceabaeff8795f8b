//! Session configuration and warning collection.
//!
//! A [`FieldConfig`] captures the per-connection settings that change how
//! values are converted on store: how warnings are checked, the SQL mode flags
//! that govern zero dates, the session time zone used by TIMESTAMP columns and
//! the record byte order. It deserializes from JSON so tools can load it from a
//! file:
//!
//! ```
//! use rowfield::field::session::{CheckLevel, FieldConfig};
//!
//! let cfg = FieldConfig::from_json(r#"{
//!     "check_level": "error_for_null",
//!     "sql_mode": { "no_zero_date": true },
//!     "time_zone": "+02:00"
//! }"#).unwrap();
//! assert_eq!(cfg.check_level, CheckLevel::ErrorForNull);
//! assert!(cfg.sql_mode.no_zero_date);
//! assert_eq!(cfg.time_zone.offset_seconds(), 7200);
//! ```
//!
//! A [`Session`] pairs the configuration with the warning requests raised by
//! store operations.

use serde::{Deserialize, Serialize};

use crate::field::status::{Warning, WarningCode, WarningLevel};
use crate::field::time::{DateFlags, TimeZone, Timeval};
use crate::FieldError;

/// How conversion problems are reported while storing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    /// Record nothing; statuses are still returned.
    Ignore,
    /// Record warning requests.
    #[default]
    Warn,
    /// Record warnings and treat NULL into NOT NULL as an error.
    ErrorForNull,
}

/// SQL mode flags that affect value conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlMode {
    pub no_zero_date: bool,
    pub no_zero_in_date: bool,
    pub allow_invalid_dates: bool,
    pub pad_char_to_full_length: bool,
    pub strict: bool,
}

impl SqlMode {
    /// Date validation flags used when storing into a temporal column.
    pub fn date_flags(&self) -> DateFlags {
        DateFlags {
            fuzzy_date: true,
            no_zero_date: self.no_zero_date,
            no_zero_in_date: self.no_zero_in_date,
            invalid_dates: self.allow_invalid_dates,
        }
    }

    /// True when any mode makes identical DATE/DATETIME images unsafe to copy raw.
    pub fn checks_dates(&self) -> bool {
        self.no_zero_date || self.no_zero_in_date || self.allow_invalid_dates
    }
}

/// Per-session conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub check_level: CheckLevel,
    pub sql_mode: SqlMode,
    pub time_zone: TimeZone,
    /// Bytes of a BLOB/TEXT value that take part in sort keys.
    pub max_sort_length: usize,
    /// Byte order of multi-byte integers inside records.
    pub low_byte_first: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            check_level: CheckLevel::Warn,
            sql_mode: SqlMode::default(),
            time_zone: TimeZone::utc(),
            max_sort_length: 1024,
            low_byte_first: true,
        }
    }
}

impl FieldConfig {
    /// Parse a configuration from a JSON document; missing keys keep defaults.
    pub fn from_json(text: &str) -> Result<Self, FieldError> {
        let cfg: FieldConfig = serde_json::from_str(text)
            .map_err(|e| FieldError::Parse(format!("Invalid field config: {}", e)))?;
        if cfg.max_sort_length < 4 {
            return Err(FieldError::Argument(format!(
                "max_sort_length must be at least 4, got {}",
                cfg.max_sort_length
            )));
        }
        Ok(cfg)
    }

    /// Load a configuration file.
    pub fn load(path: &str) -> Result<Self, FieldError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FieldError::Io(format!("Cannot read {}: {}", path, e)))?;
        Self::from_json(&text)
    }
}

/// Configuration plus the warning requests raised under it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub config: FieldConfig,
    warnings: Vec<Warning>,
    cuted_fields: u64,
    clock: Option<Timeval>,
}

impl Session {
    pub fn new(config: FieldConfig) -> Self {
        Session {
            config,
            warnings: Vec::new(),
            cuted_fields: 0,
            clock: None,
        }
    }

    /// Record a warning request unless warnings are being ignored.
    pub fn push_warning(&mut self, level: WarningLevel, code: WarningCode, field: &str, message: impl Into<String>) {
        let warning = Warning::new(level, code, field, message);
        tracing::trace!(
            field = %warning.field,
            code = ?warning.code,
            level = ?warning.level,
            "{}",
            warning.message
        );
        if self.config.check_level == CheckLevel::Ignore {
            return;
        }
        if matches!(
            code,
            WarningCode::DataTruncated
                | WarningCode::DataOutOfRange
                | WarningCode::TruncatedWrongValue
                | WarningCode::BadNull
        ) {
            self.cuted_fields += 1;
        }
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Number of values that were cut or clamped since the last reset.
    pub fn cuted_fields(&self) -> u64 {
        self.cuted_fields
    }

    pub fn reset_counters(&mut self) {
        self.cuted_fields = 0;
        self.warnings.clear();
    }

    /// Pin the clock used for CURRENT_TIMESTAMP defaults.
    pub fn set_clock(&mut self, now: Timeval) {
        self.clock = Some(now);
    }

    /// Current time as seen by CURRENT_TIMESTAMP defaults.
    pub fn now(&self) -> Timeval {
        match self.clock {
            Some(tv) => tv,
            None => {
                let now = chrono::Utc::now();
                Timeval {
                    sec: now.timestamp(),
                    usec: now.timestamp_subsec_micros(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = FieldConfig::from_json("{}").unwrap();
        assert_eq!(cfg, FieldConfig::default());
        assert!(cfg.low_byte_first);
        assert_eq!(cfg.max_sort_length, 1024);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(FieldConfig::from_json(r#"{"max_sort_length": 1}"#).is_err());
        assert!(FieldConfig::from_json(r#"{"time_zone": "nowhere"}"#).is_err());
        assert!(FieldConfig::from_json(r#"{"check_level": "loud"}"#).is_err());
    }

    #[test]
    fn test_ignore_level_drops_warnings() {
        let mut cfg = FieldConfig::default();
        cfg.check_level = CheckLevel::Ignore;
        let mut s = Session::new(cfg);
        s.push_warning(WarningLevel::Warning, WarningCode::DataTruncated, "a", "cut");
        assert!(s.warnings().is_empty());
        assert_eq!(s.cuted_fields(), 0);
    }

    #[test]
    fn test_warn_level_counts_cuts() {
        let mut s = Session::default();
        s.push_warning(WarningLevel::Warning, WarningCode::DataOutOfRange, "a", "clamped");
        s.push_warning(WarningLevel::Note, WarningCode::InvalidDocument, "d", "bad");
        assert_eq!(s.warnings().len(), 2);
        assert_eq!(s.cuted_fields(), 1);
        let taken = s.take_warnings();
        assert_eq!(taken.len(), 2);
        assert!(s.warnings().is_empty());
    }

    #[test]
    fn test_pinned_clock() {
        let mut s = Session::default();
        s.set_clock(Timeval { sec: 1_000, usec: 5 });
        assert_eq!(s.now(), Timeval { sec: 1_000, usec: 5 });
    }
}
