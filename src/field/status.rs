//! Conversion status and warning vocabulary.
//!
//! Every store path in the field layer reports a [`ConversionStatus`]. The
//! variants are totally ordered by severity, and combining two statuses for one
//! logical operation always keeps the more severe one ([`ConversionStatus::merge`]).
//!
//! Lower-level collaborators report their own codes: the decimal layer uses a
//! [`DecimalError`] bitmask and the temporal parser a [`TimeWarnings`] bitmask.
//! Both map deterministically into the status enum.

use serde::Serialize;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Severity of a store or convert operation, ordered from benign to fatal.
///
/// | Status | Meaning |
/// |--------|---------|
/// | `Ok` | Stored exactly |
/// | `NoteTimeTruncated` | Fractional seconds or time part dropped |
/// | `WarnOutOfRange` | Clamped to the type's min/max |
/// | `NoteTruncated` | Insignificant data cut (trailing spaces, rounding) |
/// | `WarnTruncated` | Significant data cut |
/// | `ErrNullConstraintViolation` | NULL into a NOT NULL column |
/// | `ErrBadValue` | Unusable input, canonical zero stored |
/// | `ErrOom` | Allocation failure in a collaborator |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    #[default]
    Ok,
    NoteTimeTruncated,
    WarnOutOfRange,
    NoteTruncated,
    WarnTruncated,
    ErrNullConstraintViolation,
    ErrBadValue,
    ErrOom,
}

impl ConversionStatus {
    /// Combine two statuses of one logical operation, keeping the worse.
    pub fn merge(self, other: ConversionStatus) -> ConversionStatus {
        self.max(other)
    }

    /// Statuses at or above this level abort the surrounding write.
    pub fn is_error(self) -> bool {
        self >= ConversionStatus::ErrNullConstraintViolation
    }

    pub fn is_ok(self) -> bool {
        self == ConversionStatus::Ok
    }

    /// Short upper-case name used in CLI output.
    pub fn name(self) -> &'static str {
        match self {
            ConversionStatus::Ok => "OK",
            ConversionStatus::NoteTimeTruncated => "NOTE_TIME_TRUNCATED",
            ConversionStatus::WarnOutOfRange => "WARN_OUT_OF_RANGE",
            ConversionStatus::NoteTruncated => "NOTE_TRUNCATED",
            ConversionStatus::WarnTruncated => "WARN_TRUNCATED",
            ConversionStatus::ErrNullConstraintViolation => "ERR_NULL_CONSTRAINT_VIOLATION",
            ConversionStatus::ErrBadValue => "ERR_BAD_VALUE",
            ConversionStatus::ErrOom => "ERR_OOM",
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromIterator<ConversionStatus> for ConversionStatus {
    fn from_iter<I: IntoIterator<Item = ConversionStatus>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ConversionStatus::Ok, ConversionStatus::merge)
    }
}

/// Error bitmask reported by the fixed-point decimal layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecimalError(u8);

impl DecimalError {
    pub const OK: DecimalError = DecimalError(0);
    pub const TRUNCATED: DecimalError = DecimalError(1);
    pub const OVERFLOW: DecimalError = DecimalError(2);
    pub const DIV_ZERO: DecimalError = DecimalError(4);
    pub const BAD_NUM: DecimalError = DecimalError(8);
    pub const OOM: DecimalError = DecimalError(16);

    pub fn contains(self, other: DecimalError) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Map into the conversion status vocabulary.
    pub fn to_status(self) -> ConversionStatus {
        if self.contains(DecimalError::OOM) {
            ConversionStatus::ErrOom
        } else if self.contains(DecimalError::DIV_ZERO) || self.contains(DecimalError::BAD_NUM) {
            ConversionStatus::ErrBadValue
        } else if self.contains(DecimalError::TRUNCATED) {
            ConversionStatus::NoteTruncated
        } else if self.contains(DecimalError::OVERFLOW) {
            ConversionStatus::WarnOutOfRange
        } else {
            ConversionStatus::Ok
        }
    }
}

impl BitOr for DecimalError {
    type Output = DecimalError;
    fn bitor(self, rhs: DecimalError) -> DecimalError {
        DecimalError(self.0 | rhs.0)
    }
}

impl BitOrAssign for DecimalError {
    fn bitor_assign(&mut self, rhs: DecimalError) {
        self.0 |= rhs.0;
    }
}

/// Warning bitmask reported by the temporal parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWarnings(u32);

impl TimeWarnings {
    pub const NONE: TimeWarnings = TimeWarnings(0);
    pub const WARN_TRUNCATED: TimeWarnings = TimeWarnings(1);
    pub const WARN_OUT_OF_RANGE: TimeWarnings = TimeWarnings(2);
    pub const WARN_INVALID_TIMESTAMP: TimeWarnings = TimeWarnings(4);
    pub const WARN_ZERO_DATE: TimeWarnings = TimeWarnings(8);
    pub const NOTE_TRUNCATED: TimeWarnings = TimeWarnings(16);
    pub const WARN_ZERO_IN_DATE: TimeWarnings = TimeWarnings(32);

    pub fn contains(self, other: TimeWarnings) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TimeWarnings) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Map into the conversion status vocabulary.
    ///
    /// Each flag maps on its own and the worst mapped status wins, so a zero
    /// date reported together with a fractional truncation is still an error.
    pub fn to_status(self) -> ConversionStatus {
        let mut status = ConversionStatus::Ok;
        if self.contains(TimeWarnings::NOTE_TRUNCATED) {
            status = status.merge(ConversionStatus::NoteTimeTruncated);
        }
        if self.contains(TimeWarnings::WARN_OUT_OF_RANGE) {
            status = status.merge(ConversionStatus::WarnOutOfRange);
        }
        if self.contains(TimeWarnings::WARN_TRUNCATED) {
            status = status.merge(ConversionStatus::NoteTruncated);
        }
        if self.intersects(TimeWarnings::WARN_ZERO_DATE | TimeWarnings::WARN_ZERO_IN_DATE) {
            status = status.merge(ConversionStatus::ErrBadValue);
        }
        status
    }
}

impl BitOr for TimeWarnings {
    type Output = TimeWarnings;
    fn bitor(self, rhs: TimeWarnings) -> TimeWarnings {
        TimeWarnings(self.0 | rhs.0)
    }
}

impl BitOrAssign for TimeWarnings {
    fn bitor_assign(&mut self, rhs: TimeWarnings) {
        self.0 |= rhs.0;
    }
}

/// Severity of a warning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Note,
    Warning,
    Error,
}

/// What a warning request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// Data was cut to fit the column.
    DataTruncated,
    /// A number was clamped to the column's range.
    DataOutOfRange,
    /// Input could not be interpreted as the column's type.
    TruncatedWrongValue,
    /// NULL stored into a NOT NULL column.
    BadNull,
    /// A temporal value outside the TIMESTAMP range.
    InvalidTimestamp,
    /// A document payload failed to parse.
    InvalidDocument,
    /// A document payload exceeds the column's maximum length.
    DocumentTooBig,
    /// A document path update could not be applied.
    DocumentPath,
}

/// A structured warning request produced by a store path.
///
/// The field layer never delivers diagnostics itself; the session collects these
/// and the caller decides how to surface them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub level: WarningLevel,
    pub code: WarningCode,
    pub field: String,
    pub message: String,
}

impl Warning {
    pub fn new(level: WarningLevel, code: WarningCode, field: &str, message: impl Into<String>) -> Self {
        Warning {
            level,
            code,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            WarningLevel::Note => "Note",
            WarningLevel::Warning => "Warning",
            WarningLevel::Error => "Error",
        };
        write!(f, "{} ({:?}) column '{}': {}", level, self.code, self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order() {
        assert!(ConversionStatus::Ok < ConversionStatus::NoteTimeTruncated);
        assert!(ConversionStatus::NoteTimeTruncated < ConversionStatus::WarnOutOfRange);
        assert!(ConversionStatus::WarnOutOfRange < ConversionStatus::NoteTruncated);
        assert!(ConversionStatus::NoteTruncated < ConversionStatus::WarnTruncated);
        assert!(ConversionStatus::WarnTruncated < ConversionStatus::ErrNullConstraintViolation);
        assert!(ConversionStatus::ErrNullConstraintViolation < ConversionStatus::ErrBadValue);
        assert!(ConversionStatus::ErrBadValue < ConversionStatus::ErrOom);
    }

    #[test]
    fn test_merge_keeps_worse() {
        let s = ConversionStatus::WarnTruncated.merge(ConversionStatus::NoteTruncated);
        assert_eq!(s, ConversionStatus::WarnTruncated);
        let s = ConversionStatus::Ok.merge(ConversionStatus::ErrBadValue);
        assert_eq!(s, ConversionStatus::ErrBadValue);
        let all: ConversionStatus = [
            ConversionStatus::Ok,
            ConversionStatus::WarnOutOfRange,
            ConversionStatus::NoteTimeTruncated,
        ]
        .into_iter()
        .collect();
        assert_eq!(all, ConversionStatus::WarnOutOfRange);
    }

    #[test]
    fn test_is_error() {
        assert!(!ConversionStatus::WarnTruncated.is_error());
        assert!(ConversionStatus::ErrNullConstraintViolation.is_error());
        assert!(ConversionStatus::ErrOom.is_error());
    }

    #[test]
    fn test_decimal_error_mapping() {
        assert_eq!(DecimalError::OK.to_status(), ConversionStatus::Ok);
        assert_eq!(DecimalError::OOM.to_status(), ConversionStatus::ErrOom);
        assert_eq!(DecimalError::DIV_ZERO.to_status(), ConversionStatus::ErrBadValue);
        assert_eq!(DecimalError::BAD_NUM.to_status(), ConversionStatus::ErrBadValue);
        assert_eq!(DecimalError::TRUNCATED.to_status(), ConversionStatus::NoteTruncated);
        assert_eq!(DecimalError::OVERFLOW.to_status(), ConversionStatus::WarnOutOfRange);
        let both = DecimalError::OVERFLOW | DecimalError::OOM;
        assert_eq!(both.to_status(), ConversionStatus::ErrOom);
    }

    #[test]
    fn test_time_warning_mapping() {
        assert_eq!(TimeWarnings::NONE.to_status(), ConversionStatus::Ok);
        assert_eq!(
            TimeWarnings::NOTE_TRUNCATED.to_status(),
            ConversionStatus::NoteTimeTruncated
        );
        assert_eq!(
            TimeWarnings::WARN_OUT_OF_RANGE.to_status(),
            ConversionStatus::WarnOutOfRange
        );
        assert_eq!(
            TimeWarnings::WARN_TRUNCATED.to_status(),
            ConversionStatus::NoteTruncated
        );
        assert_eq!(TimeWarnings::WARN_ZERO_DATE.to_status(), ConversionStatus::ErrBadValue);
        assert_eq!(
            TimeWarnings::WARN_ZERO_IN_DATE.to_status(),
            ConversionStatus::ErrBadValue
        );
        assert_eq!(
            TimeWarnings::WARN_INVALID_TIMESTAMP.to_status(),
            ConversionStatus::Ok
        );
        let mixed = TimeWarnings::NOTE_TRUNCATED | TimeWarnings::WARN_ZERO_DATE;
        assert_eq!(mixed.to_status(), ConversionStatus::ErrBadValue);
    }
}
