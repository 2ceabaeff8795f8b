//! Calendar values, temporal parsing and the packed/binary temporal encodings.
//!
//! [`MysqlTime`] is the decomposed form every temporal field converts through.
//! Two further representations are derived from it:
//!
//! - the *packed* 64-bit integer (`pack_datetime`, `pack_time`), whose low 24
//!   bits hold microseconds and whose high bits hold the calendar fields, so
//!   packed values compare as plain integers;
//! - the fractional *binary* forms written by DATETIME2, TIME2 and TIMESTAMP2
//!   columns. These are big-endian with an offset applied so `memcmp` sorts
//!   them correctly.
//!
//! Parsers return `Ok((value, warnings))` for usable input, where `warnings`
//! only carries notes such as dropped digits, and `Err(warnings)` when the
//! input cannot be turned into a value.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::field::decimal::DecimalDigits;
use crate::field::status::TimeWarnings;
use crate::FieldError;

/// Two-digit years below this are in the 2000s.
pub const YY_PART_YEAR: u32 = 70;
pub const TIME_MAX_HOUR: u32 = 838;
/// 838:59:59 as HHMMSS.
pub const TIME_MAX_VALUE: i64 = 8_385_959;
pub const TIMESTAMP_MIN_VALUE: i64 = 1;
pub const TIMESTAMP_MAX_VALUE: i64 = 2_147_483_647;

const DATETIMEF_INT_OFS: i64 = 0x80_0000_0000;
const TIMEF_INT_OFS: i64 = 0x80_0000;
const TIMEF_OFS: i64 = 0x8000_0000_0000;
const LOG10: [u32; 7] = [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000];
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Which parts of a [`MysqlTime`] are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeType {
    #[default]
    None,
    Error,
    Date,
    DateTime,
    Time,
}

/// Decomposed calendar or time-of-day value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MysqlTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Microseconds.
    pub second_part: u32,
    pub neg: bool,
    pub time_type: TimeType,
}

/// Seconds and microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeval {
    pub sec: i64,
    pub usec: u32,
}

/// Validation flags applied to parsed dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateFlags {
    /// Allow zero month or day parts.
    pub fuzzy_date: bool,
    pub no_zero_date: bool,
    pub no_zero_in_date: bool,
    /// Skip the day-of-month check.
    pub invalid_dates: bool,
}

pub fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: u32, month: u32) -> u32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[(month.clamp(1, 12) - 1) as usize]
    }
}

fn adjust_two_digit_year(year: u32) -> u32 {
    if year < YY_PART_YEAR {
        year + 2000
    } else {
        year + 1900
    }
}

impl MysqlTime {
    pub fn zero(time_type: TimeType) -> Self {
        MysqlTime {
            time_type,
            ..Default::default()
        }
    }

    pub fn date(year: u32, month: u32, day: u32) -> Self {
        MysqlTime {
            year,
            month,
            day,
            time_type: TimeType::Date,
            ..Default::default()
        }
    }

    pub fn datetime(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32, usec: u32) -> Self {
        MysqlTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
            second_part: usec,
            neg: false,
            time_type: TimeType::DateTime,
        }
    }

    pub fn time(neg: bool, hour: u32, minute: u32, second: u32, usec: u32) -> Self {
        MysqlTime {
            hour,
            minute,
            second,
            second_part: usec,
            neg,
            time_type: TimeType::Time,
            ..Default::default()
        }
    }

    pub fn is_zero_date(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }

    pub fn non_zero_date(&self) -> bool {
        !self.is_zero_date()
    }

    /// Keep only the time-of-day part.
    pub fn to_time_part(&self) -> MysqlTime {
        MysqlTime::time(self.neg, self.hour, self.minute, self.second, self.second_part)
    }

    /// Integer rendering: YYYYMMDD, YYYYMMDDHHMMSS or (signed) HHMMSS.
    pub fn to_number(&self) -> i64 {
        let hms = self.hour as i64 * 10_000 + self.minute as i64 * 100 + self.second as i64;
        let ymd = self.year as i64 * 10_000 + self.month as i64 * 100 + self.day as i64;
        match self.time_type {
            TimeType::Date => ymd,
            TimeType::DateTime => ymd * 1_000_000 + hms,
            TimeType::Time => {
                if self.neg {
                    -hms
                } else {
                    hms
                }
            }
            TimeType::None | TimeType::Error => 0,
        }
    }

    pub fn to_f64(&self) -> f64 {
        let int = self.to_number().unsigned_abs() as f64;
        let v = int + self.second_part as f64 / 1e6;
        if self.neg {
            -v
        } else {
            v
        }
    }

    pub fn to_decimal_digits(&self) -> DecimalDigits {
        let sign = if self.neg { "-" } else { "" };
        let text = format!("{}{}.{:06}", sign, self.to_number().unsigned_abs(), self.second_part);
        DecimalDigits::parse(text.as_bytes()).value
    }

    /// Text rendering with `dec` fractional digits.
    pub fn format(&self, dec: u8) -> String {
        let dec = dec.min(6) as usize;
        let frac = if dec > 0 {
            format!(".{:0width$}", self.second_part / LOG10[6 - dec], width = dec)
        } else {
            String::new()
        };
        match self.time_type {
            TimeType::Date => format!("{:04}-{:02}-{:02}", self.year, self.month, self.day),
            TimeType::DateTime => format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}{}",
                self.year, self.month, self.day, self.hour, self.minute, self.second, frac
            ),
            TimeType::Time => format!(
                "{}{:02}:{:02}:{:02}{}",
                if self.neg { "-" } else { "" },
                self.hour,
                self.minute,
                self.second,
                frac
            ),
            TimeType::None | TimeType::Error => String::new(),
        }
    }

    /// Advance by one second, carrying through the calendar.
    ///
    /// Returns false when the carry would leave the valid range or cross a
    /// zero month/day.
    fn add_second(&mut self) -> bool {
        self.second += 1;
        if self.second < 60 {
            return true;
        }
        self.second = 0;
        self.minute += 1;
        if self.minute < 60 {
            return true;
        }
        self.minute = 0;
        self.hour += 1;
        if self.time_type == TimeType::Time || self.hour < 24 {
            return true;
        }
        self.hour = 0;
        if self.month == 0 || self.day == 0 {
            return false;
        }
        self.day += 1;
        if self.day <= days_in_month(self.year, self.month) {
            return true;
        }
        self.day = 1;
        self.month += 1;
        if self.month <= 12 {
            return true;
        }
        self.month = 1;
        self.year += 1;
        self.year <= 9999
    }
}

/// Round `usec` half-up to `dec` digits. Returns the new value, whether it
/// carried into the next second and whether any digit changed.
fn round_usec(usec: u32, dec: u8) -> (u32, bool, bool) {
    if dec >= 6 {
        return (usec, false, false);
    }
    let div = LOG10[6 - dec as usize];
    let rem = usec % div;
    if rem == 0 {
        return (usec, false, false);
    }
    let mut v = usec - rem;
    if rem * 2 >= div {
        v += div;
    }
    if v >= 1_000_000 {
        (v - 1_000_000, true, true)
    } else {
        (v, false, true)
    }
}

/// Round a DATE/DATETIME value to `dec` fractional digits.
pub fn round_datetime(t: &mut MysqlTime, dec: u8) -> TimeWarnings {
    let (usec, carry, changed) = round_usec(t.second_part, dec);
    if !changed {
        return TimeWarnings::NONE;
    }
    let mut warnings = TimeWarnings::NOTE_TRUNCATED;
    let before = *t;
    t.second_part = usec;
    if carry && !t.add_second() {
        *t = before;
        t.second_part -= before.second_part % LOG10[6 - dec.min(6) as usize];
        warnings |= TimeWarnings::WARN_OUT_OF_RANGE;
    }
    warnings
}

/// Round a TIME value to `dec` fractional digits and clamp to the TIME range.
pub fn round_time(t: &mut MysqlTime, dec: u8) -> TimeWarnings {
    let (usec, carry, changed) = round_usec(t.second_part, dec);
    let mut warnings = TimeWarnings::NONE;
    if changed {
        warnings |= TimeWarnings::NOTE_TRUNCATED;
        t.second_part = usec;
        if carry {
            t.add_second();
        }
    }
    warnings | check_time_range(t)
}

/// Clamp to ±838:59:59.
pub fn check_time_range(t: &mut MysqlTime) -> TimeWarnings {
    if t.hour < TIME_MAX_HOUR
        || (t.hour == TIME_MAX_HOUR
            && (t.minute < 59 || (t.minute == 59 && (t.second < 59 || (t.second == 59 && t.second_part == 0)))))
    {
        return TimeWarnings::NONE;
    }
    t.hour = TIME_MAX_HOUR;
    t.minute = 59;
    t.second = 59;
    t.second_part = 0;
    TimeWarnings::WARN_OUT_OF_RANGE
}

/// Validate the date part. A non-empty result means the date is rejected.
pub fn check_date(t: &MysqlTime, not_zero_date: bool, flags: DateFlags) -> TimeWarnings {
    if not_zero_date {
        if (flags.no_zero_in_date || !flags.fuzzy_date) && (t.month == 0 || t.day == 0) {
            return TimeWarnings::WARN_ZERO_IN_DATE;
        }
        if !flags.invalid_dates && t.month != 0 && t.day > days_in_month(t.year, t.month) {
            return TimeWarnings::WARN_OUT_OF_RANGE;
        }
    } else if flags.no_zero_date {
        return TimeWarnings::WARN_ZERO_DATE;
    }
    TimeWarnings::NONE
}

struct Scanner<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a [u8]) -> Self {
        Scanner { s, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.s.get(self.pos + ahead).copied()
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn digit_run(&self) -> usize {
        self.s[self.pos..].iter().take_while(|b| b.is_ascii_digit()).count()
    }

    /// Read up to `max` digits; `None` when no digit is present.
    fn number(&mut self, max: usize) -> Option<(u64, usize)> {
        let n = self.digit_run().min(max);
        if n == 0 {
            return None;
        }
        let v = self.s[self.pos..self.pos + n]
            .iter()
            .fold(0u64, |acc, &d| acc.saturating_mul(10).saturating_add((d - b'0') as u64));
        self.pos += n;
        Some((v, n))
    }

    fn delimiter(&mut self) -> bool {
        match self.peek() {
            Some(b) if b.is_ascii_punctuation() => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// A punctuation delimiter directly followed by a digit.
    fn delimited_digit_follows(&self) -> bool {
        matches!(self.peek(), Some(b) if b.is_ascii_punctuation())
            && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit())
    }

    /// Fractional seconds after a '.', rounded to microseconds.
    fn fraction(&mut self) -> (u32, bool, TimeWarnings) {
        if self.peek() != Some(b'.') || !matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
            return (0, false, TimeWarnings::NONE);
        }
        self.pos += 1;
        let run = self.digit_run();
        let digits = &self.s[self.pos..self.pos + run];
        self.pos += run;
        let mut usec: u32 = 0;
        for i in 0..6 {
            usec = usec * 10 + digits.get(i).map(|d| (d - b'0') as u32).unwrap_or(0);
        }
        let mut warnings = TimeWarnings::NONE;
        let mut carry = false;
        if run > 6 {
            if digits[6..].iter().any(|&d| d != b'0') {
                warnings |= TimeWarnings::NOTE_TRUNCATED;
            }
            if digits[6] >= b'5' {
                usec += 1;
                if usec == 1_000_000 {
                    usec = 0;
                    carry = true;
                }
            }
        }
        (usec, carry, warnings)
    }

    fn trailing(&mut self) -> TimeWarnings {
        self.skip_spaces();
        if self.pos < self.s.len() {
            TimeWarnings::WARN_TRUNCATED
        } else {
            TimeWarnings::NONE
        }
    }
}

fn two_digits(d: &[u8]) -> u32 {
    d.iter().fold(0u32, |acc, &b| acc * 10 + (b - b'0') as u32)
}

/// Parse text as DATE or DATETIME.
///
/// Accepts delimited forms (`2020-01-31`, `20/1/31 10.5.7`, `2020-01-31T10:05:07.25`)
/// and compact digit strings of 6, 8, 10, 12 or 14 digits.
pub fn str_to_datetime(text: &[u8], flags: DateFlags) -> Result<(MysqlTime, TimeWarnings), TimeWarnings> {
    let mut sc = Scanner::new(text);
    sc.skip_spaces();
    let run = sc.digit_run();
    if run == 0 {
        return Err(TimeWarnings::WARN_TRUNCATED);
    }
    let mut t = MysqlTime::default();
    let mut warnings = TimeWarnings::NONE;
    let mut carry = false;
    let compact = run >= 5 || !sc.s.get(sc.pos + run).is_some_and(|b| b.is_ascii_punctuation());

    if compact {
        let digits = &sc.s[sc.pos..sc.pos + run];
        let year_len = match run {
            6 | 10 | 12 => 2,
            8 | 14 => 4,
            _ => return Err(TimeWarnings::WARN_TRUNCATED),
        };
        t.year = two_digits(&digits[..year_len]);
        t.month = two_digits(&digits[year_len..year_len + 2]);
        t.day = two_digits(&digits[year_len + 2..year_len + 4]);
        let rest = &digits[year_len + 4..];
        if year_len == 2 && t.non_zero_date() {
            t.year = adjust_two_digit_year(t.year);
        }
        t.time_type = TimeType::Date;
        if !rest.is_empty() {
            t.time_type = TimeType::DateTime;
            t.hour = two_digits(&rest[..2]);
            t.minute = two_digits(&rest[2..4]);
            if rest.len() >= 6 {
                t.second = two_digits(&rest[4..6]);
            }
        }
        sc.pos += run;
        if t.time_type == TimeType::DateTime {
            let (usec, c, w) = sc.fraction();
            t.second_part = usec;
            carry = c;
            warnings |= w;
        }
    } else {
        let (year, year_len) = sc.number(4).ok_or(TimeWarnings::WARN_TRUNCATED)?;
        if !sc.delimiter() {
            return Err(TimeWarnings::WARN_TRUNCATED);
        }
        let (month, _) = sc.number(2).ok_or(TimeWarnings::WARN_TRUNCATED)?;
        if !sc.delimiter() {
            return Err(TimeWarnings::WARN_TRUNCATED);
        }
        let (day, _) = sc.number(2).ok_or(TimeWarnings::WARN_TRUNCATED)?;
        t.year = year as u32;
        t.month = month as u32;
        t.day = day as u32;
        if year_len == 2 && t.non_zero_date() {
            t.year = adjust_two_digit_year(t.year);
        }
        t.time_type = TimeType::Date;

        let time_sep = matches!(sc.peek(), Some(b'T') | Some(b' '))
            && {
                let mut ahead = 1;
                while sc.peek_at(ahead) == Some(b' ') {
                    ahead += 1;
                }
                matches!(sc.peek_at(ahead), Some(b) if b.is_ascii_digit())
            };
        if time_sep {
            sc.pos += 1;
            sc.skip_spaces();
            t.time_type = TimeType::DateTime;
            let (hour, _) = sc.number(2).ok_or(TimeWarnings::WARN_TRUNCATED)?;
            t.hour = hour as u32;
            if sc.delimited_digit_follows() {
                sc.pos += 1;
                t.minute = sc.number(2).map(|(v, _)| v as u32).unwrap_or(0);
                if sc.delimited_digit_follows() {
                    sc.pos += 1;
                    t.second = sc.number(2).map(|(v, _)| v as u32).unwrap_or(0);
                }
            }
            let (usec, c, w) = sc.fraction();
            t.second_part = usec;
            carry = c;
            warnings |= w;
        }
    }

    warnings |= sc.trailing();

    if t.year > 9999 || t.month > 12 || t.day > 31 || t.hour > 23 || t.minute > 59 || t.second > 59 {
        return Err(warnings | TimeWarnings::WARN_TRUNCATED);
    }
    let rejected = check_date(&t, t.non_zero_date(), flags);
    if !rejected.is_empty() {
        return Err(warnings | rejected);
    }
    if carry && !t.add_second() {
        t.second_part = 999_999;
    }
    Ok((t, warnings))
}

/// Parse text as TIME.
///
/// Accepts `[-][D ]HH:MM[:SS][.frac]`, compact `[-]HHMMSS[.frac]`, `MMSS`, `SS`,
/// and full datetimes (returned as `TimeType::DateTime`).
pub fn str_to_time(text: &[u8]) -> Result<(MysqlTime, TimeWarnings), TimeWarnings> {
    let mut sc = Scanner::new(text);
    sc.skip_spaces();
    let mut neg = false;
    if sc.peek() == Some(b'-') {
        neg = true;
        sc.pos += 1;
    }
    let run = sc.digit_run();
    if run == 0 {
        return Err(TimeWarnings::WARN_TRUNCATED);
    }
    let looks_like_date = run >= 12 || ((2..=4).contains(&run) && sc.peek_at(run) == Some(b'-'));
    if !neg && looks_like_date {
        let flags = DateFlags {
            fuzzy_date: true,
            ..DateFlags::default()
        };
        if let Ok(found) = str_to_datetime(text, flags) {
            return Ok(found);
        }
    }

    let (first, _) = sc.number(usize::MAX).ok_or(TimeWarnings::WARN_TRUNCATED)?;
    let (mut hour, mut minute, mut second): (u64, u64, u64);
    let day_prefix = sc.peek() == Some(b' ') && matches!(sc.peek_at(1), Some(b) if b.is_ascii_digit());
    if day_prefix || sc.peek() == Some(b':') {
        let days = if day_prefix {
            sc.pos += 1;
            let (h, _) = sc.number(usize::MAX).ok_or(TimeWarnings::WARN_TRUNCATED)?;
            hour = h;
            first
        } else {
            hour = first;
            0
        };
        minute = 0;
        second = 0;
        if sc.peek() == Some(b':') && matches!(sc.peek_at(1), Some(b) if b.is_ascii_digit()) {
            sc.pos += 1;
            minute = sc.number(2).map(|(v, _)| v).unwrap_or(0);
            if sc.peek() == Some(b':') && matches!(sc.peek_at(1), Some(b) if b.is_ascii_digit()) {
                sc.pos += 1;
                second = sc.number(2).map(|(v, _)| v).unwrap_or(0);
            }
        }
        hour = hour.saturating_add(days.saturating_mul(24));
    } else {
        second = first % 100;
        minute = first / 100 % 100;
        hour = first / 10_000;
    }
    let (usec, carry, mut warnings) = sc.fraction();
    warnings |= sc.trailing();
    if minute > 59 || second > 59 {
        return Err(warnings | TimeWarnings::WARN_TRUNCATED);
    }
    let mut t = MysqlTime::time(neg, hour.min(u32::MAX as u64) as u32, minute as u32, second as u32, usec);
    if carry {
        t.add_second();
    }
    warnings |= check_time_range(&mut t);
    Ok((t, warnings))
}

/// Interpret an integer such as `20200131`, `200131` or `20200131100507`.
pub fn number_to_datetime(nr: i64, flags: DateFlags) -> Result<MysqlTime, TimeWarnings> {
    if nr < 0 {
        return Err(TimeWarnings::WARN_OUT_OF_RANGE);
    }
    let yy = YY_PART_YEAR as i64;
    let mut time_type = TimeType::Date;
    let nr = if nr == 0 || nr >= 10_000_101_000_000 {
        time_type = TimeType::DateTime;
        if nr > 99_999_999_999_999 {
            return Err(TimeWarnings::WARN_OUT_OF_RANGE);
        }
        nr
    } else if nr < 101 {
        return Err(TimeWarnings::WARN_TRUNCATED);
    } else if nr <= (yy - 1) * 10_000 + 1231 {
        (nr + 20_000_000) * 1_000_000
    } else if nr < yy * 10_000 + 101 {
        return Err(TimeWarnings::WARN_TRUNCATED);
    } else if nr <= 991_231 {
        (nr + 19_000_000) * 1_000_000
    } else if nr < 10_000_101 && !flags.fuzzy_date {
        return Err(TimeWarnings::WARN_TRUNCATED);
    } else if nr <= 99_991_231 {
        nr * 1_000_000
    } else if nr < 101_000_000 {
        return Err(TimeWarnings::WARN_TRUNCATED);
    } else {
        time_type = TimeType::DateTime;
        if nr <= (yy - 1) * 10_000_000_000 + 1_231_235_959 {
            nr + 20_000_000_000_000
        } else if nr < yy * 10_000_000_000 + 101_000_000 {
            return Err(TimeWarnings::WARN_TRUNCATED);
        } else if nr <= 991_231_235_959 {
            nr + 19_000_000_000_000
        } else {
            nr
        }
    };

    let mut part1 = nr / 1_000_000;
    let mut part2 = nr - part1 * 1_000_000;
    let year = (part1 / 10_000) as u32;
    part1 %= 10_000;
    let hour = (part2 / 10_000) as u32;
    part2 %= 10_000;
    let t = MysqlTime {
        year,
        month: (part1 / 100) as u32,
        day: (part1 % 100) as u32,
        hour,
        minute: (part2 / 100) as u32,
        second: (part2 % 100) as u32,
        second_part: 0,
        neg: false,
        time_type,
    };
    if t.year <= 9999 && t.month <= 12 && t.day <= 31 && t.hour <= 23 && t.minute <= 59 && t.second <= 59 {
        let rejected = check_date(&t, nr != 0, flags);
        if rejected.is_empty() {
            return Ok(t);
        }
        return Err(rejected);
    }
    if nr == 0 && flags.no_zero_date {
        return Err(TimeWarnings::WARN_ZERO_DATE);
    }
    Err(TimeWarnings::WARN_TRUNCATED)
}

/// Interpret an integer as `[-]HHMMSS`, clamping out-of-range values.
///
/// Numbers of 11 digits or more are tried as a full datetime first.
pub fn number_to_time(nr: i64) -> (MysqlTime, TimeWarnings) {
    if nr > TIME_MAX_VALUE {
        if nr >= 10_000_000_000 {
            let flags = DateFlags::default();
            if let Ok(t) = number_to_datetime(nr, flags) {
                return (t, TimeWarnings::NONE);
            }
        }
        return (MysqlTime::time(false, TIME_MAX_HOUR, 59, 59, 0), TimeWarnings::WARN_OUT_OF_RANGE);
    }
    if nr < -TIME_MAX_VALUE {
        return (MysqlTime::time(true, TIME_MAX_HOUR, 59, 59, 0), TimeWarnings::WARN_OUT_OF_RANGE);
    }
    let neg = nr < 0;
    let abs = nr.unsigned_abs();
    if abs % 100 >= 60 || abs / 100 % 100 >= 60 {
        return (MysqlTime::zero(TimeType::Time), TimeWarnings::WARN_OUT_OF_RANGE);
    }
    (
        MysqlTime::time(neg, (abs / 10_000) as u32, (abs / 100 % 100) as u32, (abs % 100) as u32, 0),
        TimeWarnings::NONE,
    )
}

fn nanos_to_usec(nanos: u32) -> (u32, bool, TimeWarnings) {
    let mut usec = nanos / 1000;
    let warnings = if nanos % 1000 != 0 {
        TimeWarnings::NOTE_TRUNCATED
    } else {
        TimeWarnings::NONE
    };
    let mut carry = false;
    if nanos % 1000 >= 500 {
        usec += 1;
        if usec == 1_000_000 {
            usec = 0;
            carry = true;
        }
    }
    (usec, carry, warnings)
}

/// Interpret a decimal or double such as `20200131100507.25` as DATETIME.
pub fn digits_to_datetime(value: &DecimalDigits, flags: DateFlags) -> Result<(MysqlTime, TimeWarnings), TimeWarnings> {
    if value.negative {
        return Err(TimeWarnings::WARN_OUT_OF_RANGE);
    }
    let (int, nanos) = value.split_nanos();
    let mut t = number_to_datetime(int, flags)?;
    let (usec, carry, mut warnings) = nanos_to_usec(nanos);
    if t.time_type == TimeType::Date {
        if nanos != 0 {
            warnings |= TimeWarnings::NOTE_TRUNCATED;
        }
        return Ok((t, warnings));
    }
    t.second_part = usec;
    if carry && !t.add_second() {
        t.second_part = 999_999;
    }
    Ok((t, warnings))
}

/// Interpret a decimal or double such as `-123456.5` as TIME.
pub fn digits_to_time(value: &DecimalDigits) -> (MysqlTime, TimeWarnings) {
    let (int, nanos) = value.split_nanos();
    let signed = if value.negative && int == 0 { 0 } else { int };
    let (mut t, mut warnings) = number_to_time(signed);
    if !warnings.is_empty() {
        return (t, warnings);
    }
    if value.negative && !value.is_zero() {
        t.neg = true;
    }
    let (usec, carry, w) = nanos_to_usec(nanos);
    warnings |= w;
    t.second_part = usec;
    if carry {
        t.add_second();
    }
    warnings |= check_time_range(&mut t);
    (t, warnings)
}

/// Packed integer form of a DATE or DATETIME value.
pub fn pack_datetime(t: &MysqlTime) -> i64 {
    let ymd = ((t.year as i64 * 13 + t.month as i64) << 5) | t.day as i64;
    let hms = ((t.hour as i64) << 12) | ((t.minute as i64) << 6) | t.second as i64;
    let tmp = (((ymd << 17) | hms) << 24) + t.second_part as i64;
    if t.neg {
        -tmp
    } else {
        tmp
    }
}

/// Packed integer form of a TIME value.
pub fn pack_time(t: &MysqlTime) -> i64 {
    let hms = ((t.hour as i64) << 12) | ((t.minute as i64) << 6) | t.second as i64;
    let tmp = (hms << 24) + t.second_part as i64;
    if t.neg {
        -tmp
    } else {
        tmp
    }
}

/// Packed form chosen by the value's own type.
pub fn pack_any(t: &MysqlTime) -> i64 {
    match t.time_type {
        TimeType::Time => pack_time(t),
        _ => pack_datetime(t),
    }
}

pub fn unpack_datetime(packed: i64, time_type: TimeType) -> MysqlTime {
    let neg = packed < 0;
    let tmp = packed.abs();
    let ymdhms = tmp >> 24;
    let ymd = ymdhms >> 17;
    let ym = ymd >> 5;
    let hms = ymdhms % (1 << 17);
    MysqlTime {
        year: (ym / 13) as u32,
        month: (ym % 13) as u32,
        day: (ymd % (1 << 5)) as u32,
        hour: (hms >> 12) as u32,
        minute: ((hms >> 6) % (1 << 6)) as u32,
        second: (hms % (1 << 6)) as u32,
        second_part: (tmp % (1 << 24)) as u32,
        neg,
        time_type,
    }
}

pub fn unpack_time(packed: i64) -> MysqlTime {
    let neg = packed < 0;
    let tmp = packed.abs();
    let hms = tmp >> 24;
    MysqlTime::time(
        neg,
        ((hms >> 12) % (1 << 10)) as u32,
        ((hms >> 6) % (1 << 6)) as u32,
        (hms % (1 << 6)) as u32,
        (tmp % (1 << 24)) as u32,
    )
}

fn frac_bytes(dec: u8) -> usize {
    (dec.min(6) as usize + 1) / 2
}

pub fn datetime_binary_length(dec: u8) -> usize {
    5 + frac_bytes(dec)
}

pub fn time_binary_length(dec: u8) -> usize {
    3 + frac_bytes(dec)
}

pub fn timestamp_binary_length(dec: u8) -> usize {
    4 + frac_bytes(dec)
}

fn int_part(nr: i64) -> i64 {
    nr >> 24
}

fn frac_part(nr: i64) -> i64 {
    nr % (1 << 24)
}

/// Write a packed DATETIME as DATETIME2 binary.
pub fn datetime_packed_to_binary(nr: i64, out: &mut [u8], dec: u8) {
    let int = ((int_part(nr) + DATETIMEF_INT_OFS) as u64) & 0xFF_FFFF_FFFF;
    BigEndian::write_uint(&mut out[..5], int, 5);
    let frac = frac_part(nr);
    match dec {
        1 | 2 => out[5] = (frac / 10_000) as i8 as u8,
        3 | 4 => BigEndian::write_int(&mut out[5..7], frac / 100, 2),
        5 | 6 => BigEndian::write_int(&mut out[5..8], frac, 3),
        _ => {}
    }
}

pub fn datetime_binary_to_packed(bin: &[u8], dec: u8) -> i64 {
    let int = BigEndian::read_uint(&bin[..5], 5) as i64 - DATETIMEF_INT_OFS;
    let frac = match dec {
        1 | 2 => bin[5] as i8 as i64 * 10_000,
        3 | 4 => BigEndian::read_int(&bin[5..7], 2) * 100,
        5 | 6 => BigEndian::read_int(&bin[5..8], 3),
        _ => 0,
    };
    (int << 24) + frac
}

/// Write a packed TIME as TIME2 binary.
pub fn time_packed_to_binary(nr: i64, out: &mut [u8], dec: u8) {
    let int = ((TIMEF_INT_OFS + int_part(nr)) as u64) & 0xFF_FFFF;
    match dec {
        1 | 2 => {
            BigEndian::write_uint(&mut out[..3], int, 3);
            out[3] = (frac_part(nr) / 10_000) as i8 as u8;
        }
        3 | 4 => {
            BigEndian::write_uint(&mut out[..3], int, 3);
            BigEndian::write_int(&mut out[3..5], frac_part(nr) / 100, 2);
        }
        5 | 6 => {
            let v = ((nr + TIMEF_OFS) as u64) & 0xFFFF_FFFF_FFFF;
            BigEndian::write_uint(&mut out[..6], v, 6);
        }
        _ => BigEndian::write_uint(&mut out[..3], int, 3),
    }
}

pub fn time_binary_to_packed(bin: &[u8], dec: u8) -> i64 {
    match dec {
        1 | 2 => {
            let mut int = BigEndian::read_uint(&bin[..3], 3) as i64 - TIMEF_INT_OFS;
            let mut frac = bin[3] as i64;
            if int < 0 && frac != 0 {
                int += 1;
                frac -= 0x100;
            }
            (int << 24) + frac * 10_000
        }
        3 | 4 => {
            let mut int = BigEndian::read_uint(&bin[..3], 3) as i64 - TIMEF_INT_OFS;
            let mut frac = BigEndian::read_uint(&bin[3..5], 2) as i64;
            if int < 0 && frac != 0 {
                int += 1;
                frac -= 0x10000;
            }
            (int << 24) + frac * 100
        }
        5 | 6 => BigEndian::read_uint(&bin[..6], 6) as i64 - TIMEF_OFS,
        _ => (BigEndian::read_uint(&bin[..3], 3) as i64 - TIMEF_INT_OFS) << 24,
    }
}

/// Write a TIMESTAMP2 image.
pub fn timestamp_to_binary(tv: Timeval, out: &mut [u8], dec: u8) {
    BigEndian::write_u32(&mut out[..4], tv.sec.clamp(0, u32::MAX as i64) as u32);
    match dec {
        1 | 2 => out[4] = (tv.usec / 10_000) as u8,
        3 | 4 => BigEndian::write_u16(&mut out[4..6], (tv.usec / 100) as u16),
        5 | 6 => BigEndian::write_uint(&mut out[4..7], tv.usec as u64, 3),
        _ => {}
    }
}

pub fn timestamp_from_binary(bin: &[u8], dec: u8) -> Timeval {
    let sec = BigEndian::read_u32(&bin[..4]) as i64;
    let usec = match dec {
        1 | 2 => bin[4] as u32 * 10_000,
        3 | 4 => BigEndian::read_u16(&bin[4..6]) as u32 * 100,
        5 | 6 => BigEndian::read_uint(&bin[4..7], 3) as u32,
        _ => 0,
    };
    Timeval { sec, usec }
}

impl Timeval {
    /// Round microseconds to `dec` digits, carrying into seconds.
    pub fn round(self, dec: u8) -> (Timeval, bool) {
        let (usec, carry, changed) = round_usec(self.usec, dec);
        (
            Timeval {
                sec: self.sec + carry as i64,
                usec,
            },
            changed,
        )
    }
}

/// A fixed UTC offset used to convert TIMESTAMP values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZone {
    offset: FixedOffset,
}

impl Default for TimeZone {
    fn default() -> Self {
        TimeZone::utc()
    }
}

impl TimeZone {
    pub fn utc() -> Self {
        TimeZone { offset: Utc.fix() }
    }

    pub fn from_offset_seconds(seconds: i32) -> Result<Self, FieldError> {
        FixedOffset::east_opt(seconds)
            .map(|offset| TimeZone { offset })
            .ok_or_else(|| FieldError::Argument(format!("time zone offset {}s out of range", seconds)))
    }

    pub fn offset_seconds(&self) -> i32 {
        self.offset.local_minus_utc()
    }

    /// Seconds since the epoch for a local DATETIME, if it is a real calendar value.
    pub fn local_to_epoch(&self, t: &MysqlTime) -> Option<i64> {
        let local = NaiveDate::from_ymd_opt(t.year as i32, t.month, t.day)?.and_hms_opt(t.hour, t.minute, t.second)?;
        Some(local.and_utc().timestamp() - self.offset_seconds() as i64)
    }

    /// Local DATETIME for a point in time.
    pub fn epoch_to_local(&self, tv: Timeval) -> MysqlTime {
        match DateTime::from_timestamp(tv.sec + self.offset_seconds() as i64, 0) {
            Some(dt) => {
                let n = dt.naive_utc();
                MysqlTime::datetime(
                    n.year() as u32,
                    n.month(),
                    n.day(),
                    n.hour(),
                    n.minute(),
                    n.second(),
                    tv.usec,
                )
            }
            None => MysqlTime::zero(TimeType::DateTime),
        }
    }
}

/// Convert a local DATETIME to a TIMESTAMP value.
///
/// A zero month or day maps to the zero timestamp; values outside the
/// TIMESTAMP range are rejected with `WARN_OUT_OF_RANGE`.
pub fn datetime_to_timeval(t: &MysqlTime, tz: &TimeZone) -> Result<Timeval, TimeWarnings> {
    if t.month == 0 || t.day == 0 {
        return Ok(Timeval::default());
    }
    match tz.local_to_epoch(t) {
        Some(sec) if (TIMESTAMP_MIN_VALUE..=TIMESTAMP_MAX_VALUE).contains(&sec) => Ok(Timeval {
            sec,
            usec: t.second_part,
        }),
        _ => Err(TimeWarnings::WARN_OUT_OF_RANGE),
    }
}

/// Convert a TIMESTAMP value to a local DATETIME; zero stays the zero date.
pub fn timeval_to_datetime(tv: Timeval, tz: &TimeZone) -> MysqlTime {
    if tv.sec == 0 && tv.usec == 0 {
        return MysqlTime::zero(TimeType::DateTime);
    }
    tz.epoch_to_local(tv)
}

impl FromStr for TimeZone {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, FieldError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Ok(TimeZone::utc());
        }
        let bad = || FieldError::Parse(format!("invalid time zone '{}', expected UTC or +HH:MM", s));
        let bytes = s.as_bytes();
        let sign = match bytes.first() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Err(bad()),
        };
        let (h, m) = s[1..].split_once(':').ok_or_else(bad)?;
        let hours: i32 = h.parse().map_err(|_| bad())?;
        let minutes: i32 = m.parse().map_err(|_| bad())?;
        if !(0..=13).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(bad());
        }
        TimeZone::from_offset_seconds(sign * (hours * 3600 + minutes * 60))
    }
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.offset_seconds();
        if secs == 0 {
            return f.write_str("UTC");
        }
        let sign = if secs < 0 { '-' } else { '+' };
        let abs = secs.abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 3600, abs % 3600 / 60)
    }
}

impl Serialize for TimeZone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeZone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fuzzy() -> DateFlags {
        DateFlags {
            fuzzy_date: true,
            ..DateFlags::default()
        }
    }

    #[test]
    fn test_parse_delimited_datetime() {
        let (t, w) = str_to_datetime(b"2020-01-31 10:05:07.25", fuzzy()).unwrap();
        assert!(w.is_empty());
        assert_eq!(t, MysqlTime::datetime(2020, 1, 31, 10, 5, 7, 250_000));
        let (t, _) = str_to_datetime(b"2020-01-31T10:05:07", fuzzy()).unwrap();
        assert_eq!(t.format(0), "2020-01-31 10:05:07");
        let (t, _) = str_to_datetime(b"99/1/2", fuzzy()).unwrap();
        assert_eq!(t.format(0), "1999-01-02");
    }

    #[test]
    fn test_parse_compact_forms() {
        let (t, _) = str_to_datetime(b"20200131", fuzzy()).unwrap();
        assert_eq!(t.time_type, TimeType::Date);
        assert_eq!(t.format(0), "2020-01-31");
        let (t, _) = str_to_datetime(b"200131100507", fuzzy()).unwrap();
        assert_eq!(t.format(0), "2020-01-31 10:05:07");
        assert!(str_to_datetime(b"2020013", fuzzy()).is_err());
    }

    #[test]
    fn test_parse_flags() {
        let w = str_to_datetime(b"2020-13-01", fuzzy()).unwrap_err();
        assert!(w.contains(TimeWarnings::WARN_TRUNCATED));
        let w = str_to_datetime(b"2021-02-29", fuzzy()).unwrap_err();
        assert!(w.contains(TimeWarnings::WARN_OUT_OF_RANGE));
        assert!(str_to_datetime(b"2020-02-29", fuzzy()).is_ok());
        let strict = DateFlags {
            fuzzy_date: true,
            no_zero_date: true,
            ..DateFlags::default()
        };
        let w = str_to_datetime(b"0000-00-00", strict).unwrap_err();
        assert!(w.contains(TimeWarnings::WARN_ZERO_DATE));
        let (_, w) = str_to_datetime(b"2020-01-01 junk", fuzzy()).unwrap();
        assert!(w.contains(TimeWarnings::WARN_TRUNCATED));
    }

    #[test]
    fn test_parse_extra_fraction_digits_round() {
        let (t, w) = str_to_datetime(b"2020-12-31 23:59:59.9999995", fuzzy()).unwrap();
        assert!(w.contains(TimeWarnings::NOTE_TRUNCATED));
        assert_eq!(t.format(6), "2021-01-01 00:00:00.000000");
    }

    #[test]
    fn test_parse_time() {
        let (t, _) = str_to_time(b"-12:34:56.5").unwrap();
        assert_eq!(t.format(1), "-12:34:56.5");
        let (t, _) = str_to_time(b"2 03:00").unwrap();
        assert_eq!((t.hour, t.minute), (51, 0));
        let (t, _) = str_to_time(b"123456").unwrap();
        assert_eq!(t.format(0), "12:34:56");
        let (t, w) = str_to_time(b"900:00:00").unwrap();
        assert!(w.contains(TimeWarnings::WARN_OUT_OF_RANGE));
        assert_eq!(t.format(0), "838:59:59");
        assert!(str_to_time(b"12:61:00").is_err());
        let (t, _) = str_to_time(b"2020-01-01 10:00:00").unwrap();
        assert_eq!(t.time_type, TimeType::DateTime);
    }

    #[test]
    fn test_number_to_datetime() {
        let t = number_to_datetime(20200131, fuzzy()).unwrap();
        assert_eq!(t.format(0), "2020-01-31");
        let t = number_to_datetime(691231, fuzzy()).unwrap();
        assert_eq!(t.year, 2069);
        let t = number_to_datetime(700101, fuzzy()).unwrap();
        assert_eq!(t.year, 1970);
        let t = number_to_datetime(20200131100507, fuzzy()).unwrap();
        assert_eq!(t.time_type, TimeType::DateTime);
        assert!(number_to_datetime(100, fuzzy()).is_err());
        assert!(number_to_datetime(-1, fuzzy()).is_err());
    }

    #[test]
    fn test_number_to_time() {
        let (t, w) = number_to_time(-123456);
        assert!(w.is_empty());
        assert_eq!(t.format(0), "-12:34:56");
        let (t, w) = number_to_time(9_000_000);
        assert!(w.contains(TimeWarnings::WARN_OUT_OF_RANGE));
        assert_eq!(t.hour, 838);
        let (_, w) = number_to_time(1_260);
        assert!(w.contains(TimeWarnings::WARN_OUT_OF_RANGE));
    }

    #[test]
    fn test_packed_forms() {
        let t = MysqlTime::datetime(2020, 1, 31, 10, 5, 7, 250_000);
        let p = pack_datetime(&t);
        assert_eq!(unpack_datetime(p, TimeType::DateTime), t);
        let later = MysqlTime::datetime(2020, 1, 31, 10, 5, 8, 0);
        assert!(pack_datetime(&later) > p);
        let tm = MysqlTime::time(true, 1, 2, 3, 4);
        assert_eq!(unpack_time(pack_time(&tm)), tm);
        assert!(pack_time(&tm) < 0);
    }

    #[test]
    fn test_datetime2_binary_sorts() {
        let a = MysqlTime::datetime(2019, 12, 31, 23, 59, 59, 990_000);
        let b = MysqlTime::datetime(2020, 1, 1, 0, 0, 0, 0);
        let mut ba = [0u8; 6];
        let mut bb = [0u8; 6];
        datetime_packed_to_binary(pack_datetime(&a), &mut ba, 2);
        datetime_packed_to_binary(pack_datetime(&b), &mut bb, 2);
        assert!(ba < bb);
        assert_eq!(datetime_binary_to_packed(&ba, 2), pack_datetime(&a));
    }

    #[test]
    fn test_time2_negative_fraction() {
        let neg_half = MysqlTime::time(true, 0, 0, 0, 500_000);
        let neg_tenth = MysqlTime::time(true, 0, 0, 0, 400_000);
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        time_packed_to_binary(pack_time(&neg_half), &mut a, 1);
        time_packed_to_binary(pack_time(&neg_tenth), &mut b, 1);
        assert_eq!(a, [0x7F, 0xFF, 0xFF, 0xCE]);
        assert!(a < b);
        assert_eq!(time_binary_to_packed(&a, 1), pack_time(&neg_half));
        let mut c = [0u8; 6];
        time_packed_to_binary(pack_time(&neg_half), &mut c, 6);
        assert_eq!(time_binary_to_packed(&c, 6), pack_time(&neg_half));
    }

    #[test]
    fn test_rounding() {
        let mut t = MysqlTime::datetime(2020, 1, 1, 0, 0, 0, 999_999);
        let w = round_datetime(&mut t, 3);
        assert!(w.contains(TimeWarnings::NOTE_TRUNCATED));
        assert_eq!(t.format(3), "2020-01-01 00:00:01.000");
        let mut t = MysqlTime::datetime(9999, 12, 31, 23, 59, 59, 999_999);
        let w = round_datetime(&mut t, 0);
        assert!(w.contains(TimeWarnings::WARN_OUT_OF_RANGE));
        assert_eq!(t.format(0), "9999-12-31 23:59:59");
        let mut t = MysqlTime::time(false, 1, 0, 0, 123_456);
        assert!(round_time(&mut t, 6).is_empty());
    }

    #[test]
    fn test_timestamp_conversion() {
        let tz: TimeZone = "+02:00".parse().unwrap();
        let t = MysqlTime::datetime(1970, 1, 1, 2, 0, 1, 0);
        assert_eq!(datetime_to_timeval(&t, &tz).unwrap(), Timeval { sec: 1, usec: 0 });
        let t = MysqlTime::datetime(2040, 1, 1, 0, 0, 0, 0);
        assert!(datetime_to_timeval(&t, &tz).is_err());
        let back = timeval_to_datetime(Timeval { sec: 1, usec: 5 }, &tz);
        assert_eq!(back.format(6), "1970-01-01 02:00:01.000005");
        assert_eq!(timeval_to_datetime(Timeval::default(), &tz).format(0), "0000-00-00 00:00:00");
    }

    #[test]
    fn test_time_zone_text() {
        assert_eq!(TimeZone::utc().to_string(), "UTC");
        let tz: TimeZone = "-05:30".parse().unwrap();
        assert_eq!(tz.offset_seconds(), -19_800);
        assert_eq!(tz.to_string(), "-05:30");
        assert!("nowhere".parse::<TimeZone>().is_err());
        assert!("+25:00".parse::<TimeZone>().is_err());
    }

    #[test]
    fn test_timestamp_binary() {
        let tv = Timeval { sec: 1_600_000_000, usec: 123_400 };
        let mut out = [0u8; 6];
        timestamp_to_binary(tv, &mut out, 4);
        assert_eq!(timestamp_from_binary(&out, 4), tv);
    }
}
