//! Date and time columns, plus YEAR.
//!
//! Legacy encodings keep integers in record byte order (`NEWDATE` packs
//! `year<<9 | month<<5 | day` in 3 bytes, `TIME` stores `±HHMMSS`, `DATETIME`
//! stores `YYYYMMDDHHMMSS` in 8 bytes, `TIMESTAMP` stores epoch seconds).
//! The fractional encodings use the big-endian binary forms from
//! [`crate::field::time`], which compare with `memcmp`.
//!
//! TIMESTAMP values are epoch based and shown in the session time zone.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate, Timelike};

use crate::field::base::{Field, FieldKind, RecordRef, TemporalKind};
use crate::field::codec;
use crate::field::decimal::DecimalDigits;
use crate::field::row::RowBuffer;
use crate::field::status::{ConversionStatus, DecimalError, TimeWarnings, WarningCode, WarningLevel};
use crate::field::time::{
    self, check_date, datetime_to_timeval, round_datetime, round_time, timeval_to_datetime, DateFlags, MysqlTime,
    TimeType, Timeval, TIMESTAMP_MAX_VALUE, YY_PART_YEAR,
};

fn kind_of(f: &Field) -> Option<(TemporalKind, u8)> {
    match f.kind {
        FieldKind::Temporal { kind, dec } => Some((kind, dec)),
        _ => None,
    }
}

fn type_name(f: &Field) -> &'static str {
    match kind_of(f) {
        None => "year",
        Some((TemporalKind::NewDate, _)) => "date",
        Some((TemporalKind::Time, _)) | Some((TemporalKind::Time2, _)) => "time",
        Some((k, _)) if k.is_timestamp() => "timestamp",
        Some(_) => "datetime",
    }
}

fn date_flags(f: &Field, row: &RowBuffer) -> DateFlags {
    let mut flags = row.config().sql_mode.date_flags();
    if matches!(kind_of(f), Some((k, _)) if k.is_timestamp()) {
        flags.no_zero_in_date = true;
    }
    flags
}

/// Place a TIME value on `date`, carrying into neighbouring days.
fn time_on_date(date: &MysqlTime, t: &MysqlTime) -> MysqlTime {
    let Some(midnight) = NaiveDate::from_ymd_opt(date.year as i32, date.month, date.day).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return MysqlTime::zero(TimeType::DateTime);
    };
    let magnitude = ((t.hour as i64 * 3600 + t.minute as i64 * 60 + t.second as i64) * 1_000_000) + t.second_part as i64;
    let delta = Duration::microseconds(if t.neg { -magnitude } else { magnitude });
    match midnight.checked_add_signed(delta) {
        Some(dt) if dt.year() >= 0 => MysqlTime::datetime(
            dt.year() as u32,
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.nanosecond() / 1000,
        ),
        _ => MysqlTime::zero(TimeType::DateTime),
    }
}

fn current_date(row: &RowBuffer) -> MysqlTime {
    let local = row.config().time_zone.epoch_to_local(row.session().now());
    MysqlTime::date(local.year, local.month, local.day)
}

// -------------------------------------------------------------------------
// Record images

fn read_timeval_image(f: &Field, r: RecordRef<'_>) -> Timeval {
    match kind_of(f) {
        Some((TemporalKind::Timestamp, _)) => Timeval {
            sec: codec::read_uint(r.bytes(4), 4, r.low_byte_first()) as i64,
            usec: 0,
        },
        Some((TemporalKind::Timestamp2, dec)) => time::timestamp_from_binary(r.bytes(f.pack_length()), dec),
        _ => Timeval::default(),
    }
}

fn write_timeval_image(f: &Field, row: &mut RowBuffer, tv: Timeval) {
    let lbf = row.low_byte_first();
    match kind_of(f) {
        Some((TemporalKind::Timestamp, _)) => codec::write_uint(row.slice_mut(f.ptr, 4), tv.sec as u64, 4, lbf),
        Some((TemporalKind::Timestamp2, dec)) => {
            let len = f.pack_length();
            time::timestamp_to_binary(tv, row.slice_mut(f.ptr, len), dec)
        }
        _ => {}
    }
}

/// Decode the stored value. TIMESTAMP is shown in the session time zone.
fn read_native(f: &Field, r: RecordRef<'_>) -> MysqlTime {
    let lbf = r.low_byte_first();
    let Some((kind, dec)) = kind_of(f) else {
        let y = r.bytes(1)[0] as u32;
        let year = if y == 0 { 0 } else { y + 1900 };
        return MysqlTime {
            year,
            time_type: TimeType::Date,
            ..MysqlTime::default()
        };
    };
    match kind {
        TemporalKind::NewDate => {
            let v = codec::read_uint(r.bytes(3), 3, lbf) as u32;
            MysqlTime::date(v >> 9, (v >> 5) & 15, v & 31)
        }
        TemporalKind::Time => {
            let v = codec::read_int(r.bytes(3), 3, lbf);
            let a = v.unsigned_abs() as u32;
            MysqlTime::time(v < 0, a / 10_000, a / 100 % 100, a % 100, 0)
        }
        TemporalKind::DateTime => {
            let v = codec::read_int(r.bytes(8), 8, lbf).max(0) as u64;
            let ymd = (v / 1_000_000) as u32;
            let hms = (v % 1_000_000) as u32;
            MysqlTime::datetime(
                ymd / 10_000,
                ymd / 100 % 100,
                ymd % 100,
                hms / 10_000,
                hms / 100 % 100,
                hms % 100,
                0,
            )
        }
        TemporalKind::Time2 => time::unpack_time(time::time_binary_to_packed(r.bytes(f.pack_length()), dec)),
        TemporalKind::DateTime2 => time::unpack_datetime(
            time::datetime_binary_to_packed(r.bytes(f.pack_length()), dec),
            TimeType::DateTime,
        ),
        TemporalKind::Timestamp | TemporalKind::Timestamp2 => {
            timeval_to_datetime(read_timeval_image(f, r), &r.row.config().time_zone)
        }
    }
}

/// Encode an already validated value. TIMESTAMP goes through
/// [`write_timeval_image`] instead.
fn write_native(f: &Field, row: &mut RowBuffer, t: &MysqlTime) {
    let lbf = row.low_byte_first();
    let Some((kind, dec)) = kind_of(f) else {
        return;
    };
    let len = f.pack_length();
    match kind {
        TemporalKind::NewDate => {
            let v = (t.year << 9) | (t.month << 5) | t.day;
            codec::write_uint(row.slice_mut(f.ptr, 3), v as u64, 3, lbf);
        }
        TemporalKind::Time => {
            let hms = (t.hour * 10_000 + t.minute * 100 + t.second) as i64;
            codec::write_int(row.slice_mut(f.ptr, 3), if t.neg { -hms } else { hms }, 3, lbf);
        }
        TemporalKind::DateTime => {
            let ymd = (t.year * 10_000 + t.month * 100 + t.day) as i64;
            let hms = (t.hour * 10_000 + t.minute * 100 + t.second) as i64;
            codec::write_int(row.slice_mut(f.ptr, 8), ymd * 1_000_000 + hms, 8, lbf);
        }
        TemporalKind::Time2 => time::time_packed_to_binary(time::pack_time(t), row.slice_mut(f.ptr, len), dec),
        TemporalKind::DateTime2 => {
            time::datetime_packed_to_binary(time::pack_datetime(t), row.slice_mut(f.ptr, len), dec)
        }
        TemporalKind::Timestamp | TemporalKind::Timestamp2 => {}
    }
}

fn write_zero(f: &Field, row: &mut RowBuffer) {
    match kind_of(f) {
        None => row.slice_mut(f.ptr, 1)[0] = 0,
        Some((k, _)) if k.is_timestamp() => write_timeval_image(f, row, Timeval::default()),
        Some((k, _)) => write_native(f, row, &MysqlTime::zero(k.time_type())),
    }
}

// -------------------------------------------------------------------------
// Store paths

/// Report the warnings of a temporal store; rounding alone stays silent.
fn report(f: &Field, row: &mut RowBuffer, w: TimeWarnings, src: &str) {
    if w.contains(TimeWarnings::WARN_OUT_OF_RANGE) {
        f.warn(
            row,
            WarningLevel::Warning,
            WarningCode::DataOutOfRange,
            format!("Out of range {} value: '{}'", type_name(f), src),
        );
    } else if w.intersects(TimeWarnings::WARN_ZERO_DATE | TimeWarnings::WARN_ZERO_IN_DATE) {
        f.warn(
            row,
            WarningLevel::Warning,
            WarningCode::TruncatedWrongValue,
            format!("Incorrect {} value: '{}'", type_name(f), src),
        );
    } else if w.contains(TimeWarnings::WARN_TRUNCATED) {
        f.warn(row, WarningLevel::Warning, WarningCode::DataTruncated, format!("Data truncated for value '{}'", src));
    } else if w.contains(TimeWarnings::NOTE_TRUNCATED) {
        f.warn(row, WarningLevel::Note, WarningCode::DataTruncated, format!("Data truncated for value '{}'", src));
    }
}

/// The source could not be interpreted: store zero.
fn store_failed(f: &Field, row: &mut RowBuffer, w: TimeWarnings, src: &str) -> ConversionStatus {
    write_zero(f, row);
    if w.contains(TimeWarnings::WARN_OUT_OF_RANGE) {
        report(f, row, TimeWarnings::WARN_OUT_OF_RANGE, src);
        ConversionStatus::WarnOutOfRange
    } else {
        f.warn(
            row,
            WarningLevel::Warning,
            WarningCode::TruncatedWrongValue,
            format!("Incorrect {} value: '{}'", type_name(f), src),
        );
        ConversionStatus::ErrBadValue
    }
}

/// Validate, adjust to the column's type and precision, then write.
fn store_checked(f: &Field, row: &mut RowBuffer, mut t: MysqlTime, mut w: TimeWarnings, src: &str) -> ConversionStatus {
    let Some((kind, dec)) = kind_of(f) else {
        return ConversionStatus::Ok;
    };
    let mut rounding = TimeWarnings::NONE;
    if kind.has_date() {
        if t.time_type == TimeType::Time {
            t = time_on_date(&current_date(row), &t);
        }
        if kind == TemporalKind::NewDate {
            if t.hour != 0 || t.minute != 0 || t.second != 0 || t.second_part != 0 {
                w |= TimeWarnings::NOTE_TRUNCATED;
            }
            t = MysqlTime::date(t.year, t.month, t.day);
        } else {
            t.time_type = TimeType::DateTime;
        }
        let bad = check_date(&t, t.non_zero_date(), date_flags(f, row));
        if !bad.is_empty() {
            write_zero(f, row);
            let w = w | bad;
            report(f, row, w, src);
            return w.to_status();
        }
        if kind != TemporalKind::NewDate {
            rounding = round_datetime(&mut t, dec);
        }
        if kind.is_timestamp() {
            match datetime_to_timeval(&t, &row.config().time_zone) {
                Ok(tv) => write_timeval_image(f, row, tv),
                Err(e) => {
                    write_zero(f, row);
                    w |= e;
                }
            }
        } else {
            write_native(f, row, &t);
        }
    } else {
        if t.time_type != TimeType::Time {
            if t.time_type == TimeType::DateTime || t.non_zero_date() {
                w |= TimeWarnings::NOTE_TRUNCATED;
            }
            t = t.to_time_part();
        }
        rounding = round_time(&mut t, dec);
        if rounding.contains(TimeWarnings::WARN_OUT_OF_RANGE) {
            w |= TimeWarnings::WARN_OUT_OF_RANGE;
        }
        write_native(f, row, &t);
    }
    report(f, row, w, src);
    (w | rounding).to_status()
}

fn year_store_int(f: &Field, row: &mut RowBuffer, nr: i64, from_text_len: Option<usize>) -> ConversionStatus {
    if nr < 0 || (100..=1900).contains(&nr) || nr > 2155 {
        row.slice_mut(f.ptr, 1)[0] = 0;
        f.warn_status(row, ConversionStatus::WarnOutOfRange);
        return ConversionStatus::WarnOutOfRange;
    }
    let keep_zero = match from_text_len {
        Some(len) => len == 4,
        None => f.field_length == 4,
    };
    let mut v = nr;
    if v != 0 || !keep_zero {
        if v < YY_PART_YEAR as i64 {
            v += 100;
        } else if v > 1900 {
            v -= 1900;
        }
    }
    row.slice_mut(f.ptr, 1)[0] = v as u8;
    ConversionStatus::Ok
}

// -------------------------------------------------------------------------
// Family entry points

pub(crate) fn store_str(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    let src = String::from_utf8_lossy(s).into_owned();
    let Some((kind, _)) = kind_of(f) else {
        let parsed = DecimalDigits::parse(s);
        if parsed.error.contains(DecimalError::BAD_NUM) {
            row.slice_mut(f.ptr, 1)[0] = 0;
            return store_failed_year(f, row, &src);
        }
        let mut int = parsed.value.clone();
        let had_fraction = int.frac.iter().any(|&d| d != 0);
        int.frac.clear();
        let (nr, _) = int.to_i64(false);
        let status = year_store_int(f, row, nr, Some(src.trim().len()));
        if status.is_ok()
            && (had_fraction || parsed.error.contains(DecimalError::TRUNCATED))
        {
            f.warn(row, WarningLevel::Warning, WarningCode::DataTruncated, format!("Data truncated for value '{}'", src));
            return ConversionStatus::WarnTruncated;
        }
        return status;
    };
    let parsed = if kind.has_date() {
        time::str_to_datetime(s, date_flags(f, row))
    } else {
        time::str_to_time(s)
    };
    match parsed {
        Ok((t, w)) => store_checked(f, row, t, w, &src),
        Err(w) => store_failed(f, row, w, &src),
    }
}

fn store_failed_year(f: &Field, row: &mut RowBuffer, src: &str) -> ConversionStatus {
    f.warn(
        row,
        WarningLevel::Warning,
        WarningCode::TruncatedWrongValue,
        format!("Incorrect year value: '{}'", src),
    );
    ConversionStatus::ErrBadValue
}

pub(crate) fn store_int(f: &Field, row: &mut RowBuffer, nr: i64, unsigned: bool) -> ConversionStatus {
    let src = if unsigned {
        (nr as u64).to_string()
    } else {
        nr.to_string()
    };
    let Some((kind, _)) = kind_of(f) else {
        let nr = if unsigned && nr < 0 { i64::MAX } else { nr };
        return year_store_int(f, row, nr, None);
    };
    if unsigned && nr < 0 {
        return store_failed(f, row, TimeWarnings::WARN_OUT_OF_RANGE, &src);
    }
    if kind.has_date() {
        match time::number_to_datetime(nr, date_flags(f, row)) {
            Ok(t) => store_checked(f, row, t, TimeWarnings::NONE, &src),
            Err(w) => store_failed(f, row, w, &src),
        }
    } else {
        let (t, w) = time::number_to_time(nr);
        store_checked(f, row, t, w, &src)
    }
}

pub(crate) fn store_decimal(f: &Field, row: &mut RowBuffer, value: &DecimalDigits) -> ConversionStatus {
    let src = value.to_text(value.frac.len());
    let Some((kind, _)) = kind_of(f) else {
        let (nr, _) = value.to_i64(false);
        return year_store_int(f, row, nr, None);
    };
    if kind.has_date() {
        match time::digits_to_datetime(value, date_flags(f, row)) {
            Ok((t, w)) => store_checked(f, row, t, w, &src),
            Err(w) => store_failed(f, row, w, &src),
        }
    } else {
        let (t, w) = time::digits_to_time(value);
        store_checked(f, row, t, w, &src)
    }
}

pub(crate) fn store_real(f: &Field, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
    if nr.is_nan() {
        return store_failed(f, row, TimeWarnings::WARN_OUT_OF_RANGE, "NaN");
    }
    if kind_of(f).is_none() {
        return year_store_int(f, row, nr.round_ties_even() as i64, None);
    }
    let (value, err) = DecimalDigits::from_f64(nr);
    if !err.is_ok() {
        return store_failed(f, row, TimeWarnings::WARN_OUT_OF_RANGE, &nr.to_string());
    }
    store_decimal(f, row, &value)
}

pub(crate) fn store_time(f: &Field, row: &mut RowBuffer, t: &MysqlTime, _dec: u8) -> ConversionStatus {
    let src = t.format(6);
    if kind_of(f).is_none() {
        let year = if t.time_type == TimeType::Time {
            current_date(row).year
        } else {
            t.year
        };
        return year_store_int(f, row, year as i64, None);
    }
    store_checked(f, row, *t, TimeWarnings::NONE, &src)
}

/// Store an epoch value into a TIMESTAMP column.
pub(crate) fn store_timeval(f: &Field, row: &mut RowBuffer, tv: Timeval) -> ConversionStatus {
    let dec = kind_of(f).map(|(_, d)| d).unwrap_or(0);
    let (tv, changed) = tv.round(dec);
    if tv.sec < 0 || tv.sec > TIMESTAMP_MAX_VALUE {
        write_zero(f, row);
        f.warn_status(row, ConversionStatus::WarnOutOfRange);
        return ConversionStatus::WarnOutOfRange;
    }
    write_timeval_image(f, row, tv);
    if changed {
        ConversionStatus::NoteTimeTruncated
    } else {
        ConversionStatus::Ok
    }
}

pub(crate) fn read_timeval(f: &Field, r: RecordRef<'_>) -> Timeval {
    read_timeval_image(f, r)
}

pub(crate) fn val_int(f: &Field, r: RecordRef<'_>) -> i64 {
    let t = read_native(f, r);
    if kind_of(f).is_none() {
        return t.year as i64;
    }
    t.to_number()
}

pub(crate) fn val_real(f: &Field, r: RecordRef<'_>) -> f64 {
    if kind_of(f).is_none() {
        return read_native(f, r).year as f64;
    }
    read_native(f, r).to_f64()
}

pub(crate) fn val_decimal(f: &Field, r: RecordRef<'_>) -> DecimalDigits {
    match kind_of(f) {
        None => DecimalDigits::from_i64(read_native(f, r).year as i64),
        Some((_, dec)) => read_native(f, r).to_decimal_digits().round_to(dec as usize).0,
    }
}

pub(crate) fn val_str<'a>(f: &Field, r: RecordRef<'a>) -> Cow<'a, [u8]> {
    let t = read_native(f, r);
    let text = match kind_of(f) {
        None => format!("{:04}", t.year),
        Some((_, dec)) => t.format(dec),
    };
    Cow::Owned(text.into_bytes())
}

pub(crate) fn get_date(f: &Field, row: &RowBuffer) -> Option<MysqlTime> {
    if f.is_null(row) {
        return None;
    }
    let t = read_native(f, f.image(row));
    match kind_of(f) {
        Some((k, _)) if !k.has_date() => Some(time_on_date(&current_date(row), &t)),
        _ => Some(t),
    }
}

pub(crate) fn get_time(f: &Field, row: &RowBuffer) -> Option<MysqlTime> {
    if f.is_null(row) || kind_of(f).is_none() {
        return None;
    }
    let t = read_native(f, f.image(row));
    match t.time_type {
        TimeType::Time => Some(t),
        _ => Some(t.to_time_part()),
    }
}

pub(crate) fn cmp(f: &Field, a: RecordRef<'_>, b: RecordRef<'_>) -> Ordering {
    let (la, lb) = (a.low_byte_first(), b.low_byte_first());
    match kind_of(f) {
        None => a.bytes(1)[0].cmp(&b.bytes(1)[0]),
        Some((TemporalKind::NewDate, _)) => {
            codec::read_uint(a.bytes(3), 3, la).cmp(&codec::read_uint(b.bytes(3), 3, lb))
        }
        Some((TemporalKind::Time, _)) => codec::read_int(a.bytes(3), 3, la).cmp(&codec::read_int(b.bytes(3), 3, lb)),
        Some((TemporalKind::DateTime, _)) => {
            codec::read_int(a.bytes(8), 8, la).cmp(&codec::read_int(b.bytes(8), 8, lb))
        }
        Some((TemporalKind::Timestamp, _)) => {
            codec::read_uint(a.bytes(4), 4, la).cmp(&codec::read_uint(b.bytes(4), 4, lb))
        }
        Some(_) => {
            let len = f.pack_length();
            a.bytes(len).cmp(b.bytes(len))
        }
    }
}

pub(crate) fn make_sort_key(f: &Field, r: RecordRef<'_>, to: &mut [u8]) {
    let big_endian = !r.low_byte_first();
    match kind_of(f) {
        None => codec::fill_key(to, r.bytes(1)),
        Some((TemporalKind::NewDate, _)) => codec::copy_integer(to, r.bytes(3), big_endian, true),
        Some((TemporalKind::Time, _)) => codec::copy_integer(to, r.bytes(3), big_endian, false),
        Some((TemporalKind::DateTime, _)) => codec::copy_integer(to, r.bytes(8), big_endian, true),
        Some((TemporalKind::Timestamp, _)) => codec::copy_integer(to, r.bytes(4), big_endian, true),
        Some(_) => codec::fill_key(to, r.bytes(f.pack_length())),
    }
}

pub(crate) fn reset(f: &Field, row: &mut RowBuffer) -> ConversionStatus {
    write_zero(f, row);
    ConversionStatus::Ok
}
