//! Integer, floating-point and fixed-point columns.
//!
//! Integers and floats live in the record in the buffer's byte order. The
//! legacy DECIMAL keeps right-justified ASCII text; NEWDECIMAL keeps the
//! memcmp-ordered binary image produced by [`decimal::decimal2bin`].

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::field::base::{need, Field, FieldKind, RecordRef};
use crate::field::codec;
use crate::field::decimal::{self, DecimalDigits};
use crate::field::row::RowBuffer;
use crate::field::status::{ConversionStatus, DecimalError, WarningCode, WarningLevel};
use crate::field::types::NOT_FIXED_DEC;
use crate::FieldError;

fn lossy(s: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(s)
}

fn type_word(f: &Field) -> &'static str {
    match f.kind {
        FieldKind::Int { .. } => "integer",
        FieldKind::Float { .. } | FieldKind::Double { .. } => "double",
        _ => "decimal",
    }
}

/// Magnitude of an integral digit string, saturating far beyond any column.
fn digits_to_i128(d: &DecimalDigits) -> i128 {
    let mut acc: i128 = 0;
    for &digit in &d.int {
        if acc > i128::MAX / 100 {
            acc = i128::MAX / 100;
            break;
        }
        acc = acc * 10 + digit as i128;
    }
    if d.negative {
        -acc
    } else {
        acc
    }
}

// -------------------------------------------------------------------------
// Integers

fn write_int_image(f: &Field, row: &mut RowBuffer, v: i128) {
    if let FieldKind::Int { width, .. } = f.kind {
        let lbf = row.low_byte_first();
        let n = width.bytes();
        codec::write_uint(row.slice_mut(f.ptr, n), v as u64, n, lbf);
    }
}

fn read_int_image(f: &Field, r: RecordRef<'_>) -> i128 {
    match f.kind {
        FieldKind::Int { width, unsigned, .. } => {
            let n = width.bytes();
            if unsigned {
                codec::read_uint(r.bytes(n), n, r.low_byte_first()) as i128
            } else {
                codec::read_int(r.bytes(n), n, r.low_byte_first()) as i128
            }
        }
        _ => 0,
    }
}

/// Clamp into the column range, write, and warn on overflow.
fn store_int_value(f: &Field, row: &mut RowBuffer, v: i128) -> ConversionStatus {
    let (lo, hi) = match f.kind {
        FieldKind::Int { width, unsigned, .. } => width.range(unsigned),
        _ => return ConversionStatus::Ok,
    };
    let (v, status) = if v < lo {
        (lo, ConversionStatus::WarnOutOfRange)
    } else if v > hi {
        (hi, ConversionStatus::WarnOutOfRange)
    } else {
        (v, ConversionStatus::Ok)
    };
    write_int_image(f, row, v);
    f.warn_status(row, status);
    status
}

// -------------------------------------------------------------------------
// Floating point

fn real_max(f: &Field) -> f64 {
    let (dec, float) = match f.kind {
        FieldKind::Float { dec, .. } => (dec, true),
        FieldKind::Double { dec, .. } => (dec, false),
        _ => return f64::MAX,
    };
    if dec < NOT_FIXED_DEC {
        let int_digits = f.field_length as i32 - dec as i32;
        10f64.powi(int_digits) - 10f64.powi(-(dec as i32))
    } else if float {
        f32::MAX as f64
    } else {
        f64::MAX
    }
}

/// Round to the column scale and clamp to its range.
fn truncate_real(f: &Field, nr: f64) -> (f64, ConversionStatus) {
    let (dec, unsigned) = match f.kind {
        FieldKind::Float { dec, unsigned } | FieldKind::Double { dec, unsigned } => (dec, unsigned),
        _ => return (nr, ConversionStatus::Ok),
    };
    if nr.is_nan() || (unsigned && nr < 0.0) {
        return (0.0, ConversionStatus::WarnOutOfRange);
    }
    let mut v = nr;
    let mut status = ConversionStatus::Ok;
    if dec < NOT_FIXED_DEC && v.is_finite() {
        let scale = 10f64.powi(dec as i32);
        let floor = v.floor();
        let rounded = floor + ((v - floor) * scale).round_ties_even() / scale;
        if rounded != v {
            status = ConversionStatus::NoteTruncated;
        }
        v = rounded;
    }
    let max = real_max(f);
    if v > max {
        (max, ConversionStatus::WarnOutOfRange)
    } else if v < -max {
        (-max, ConversionStatus::WarnOutOfRange)
    } else {
        (v, status)
    }
}

fn store_real_value(f: &Field, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
    let (v, status) = truncate_real(f, nr);
    let lbf = row.low_byte_first();
    match f.kind {
        FieldKind::Float { .. } => codec::write_f32(row.slice_mut(f.ptr, 4), v as f32, lbf),
        FieldKind::Double { .. } => codec::write_f64(row.slice_mut(f.ptr, 8), v, lbf),
        _ => {}
    }
    if status == ConversionStatus::WarnOutOfRange {
        f.warn_status(row, status);
    }
    status
}

fn read_real_image(f: &Field, r: RecordRef<'_>) -> f64 {
    match f.kind {
        FieldKind::Float { .. } => codec::read_f32(r.bytes(4), r.low_byte_first()) as f64,
        FieldKind::Double { .. } => codec::read_f64(r.bytes(8), r.low_byte_first()),
        _ => 0.0,
    }
}

fn format_real(v: f64, float: bool) -> String {
    let a = v.abs();
    let scientific = a != 0.0 && (a >= 1e15 || a < 1e-4);
    match (float, scientific) {
        (true, true) => format!("{:e}", v as f32),
        (true, false) => format!("{}", v as f32),
        (false, true) => format!("{:e}", v),
        (false, false) => format!("{}", v),
    }
}

// -------------------------------------------------------------------------
// Fixed point

/// Store into either decimal encoding.
fn store_digits(f: &Field, row: &mut RowBuffer, value: &DecimalDigits) -> ConversionStatus {
    match f.kind {
        FieldKind::Decimal { dec, unsigned, zerofill } => store_legacy(f, row, value, dec, unsigned, zerofill),
        FieldKind::NewDecimal { precision, dec, unsigned } => {
            let mut status = ConversionStatus::Ok;
            let mut value = value.clone();
            if unsigned && value.negative && !value.is_zero() {
                value = DecimalDigits::zero();
                status = ConversionStatus::WarnOutOfRange;
            }
            let mut buf = vec![0u8; decimal::bin_size(precision, dec)];
            let err = decimal::decimal2bin(&value, precision, dec, &mut buf);
            if err.contains(DecimalError::OVERFLOW) {
                let max = DecimalDigits::max_value(precision, dec, value.negative);
                decimal::decimal2bin(&max, precision, dec, &mut buf);
                status = ConversionStatus::WarnOutOfRange;
            } else if err.contains(DecimalError::TRUNCATED) {
                status = status.merge(ConversionStatus::NoteTruncated);
            }
            let len = buf.len();
            row.slice_mut(f.ptr, len).copy_from_slice(&buf);
            f.warn_status(row, status);
            status
        }
        _ => ConversionStatus::Ok,
    }
}

fn store_legacy(
    f: &Field,
    row: &mut RowBuffer,
    value: &DecimalDigits,
    dec: u8,
    unsigned: bool,
    zerofill: bool,
) -> ConversionStatus {
    let len = f.field_length as usize;
    let (mut v, dropped) = value.round_to(dec as usize);
    let mut status = if dropped {
        ConversionStatus::NoteTruncated
    } else {
        ConversionStatus::Ok
    };
    if unsigned && v.negative && !v.is_zero() {
        v = DecimalDigits::zero();
        status = ConversionStatus::WarnOutOfRange;
    }
    let mut text = v.to_text(dec as usize);
    if text.len() > len {
        let negative = v.negative && !unsigned;
        let frac_part = if dec > 0 { dec as usize + 1 } else { 0 };
        let int_digits = len.saturating_sub(frac_part + negative as usize).max(1);
        text.clear();
        if negative {
            text.push('-');
        }
        text.push_str(&"9".repeat(int_digits));
        if dec > 0 {
            text.push('.');
            text.push_str(&"9".repeat(dec as usize));
        }
        status = ConversionStatus::WarnOutOfRange;
    }
    let pad = if zerofill { b'0' } else { b' ' };
    let dst = row.slice_mut(f.ptr, len);
    let body = text.as_bytes();
    let body = &body[body.len().saturating_sub(len)..];
    let start = len - body.len();
    dst[..start].fill(pad);
    dst[start..].copy_from_slice(body);
    f.warn_status(row, status);
    status
}

fn read_digits(f: &Field, r: RecordRef<'_>) -> DecimalDigits {
    match f.kind {
        FieldKind::Decimal { .. } => DecimalDigits::parse(r.bytes(f.field_length as usize)).value,
        FieldKind::NewDecimal { precision, dec, .. } => {
            decimal::bin2decimal(r.bytes(decimal::bin_size(precision, dec)), precision, dec)
        }
        _ => DecimalDigits::zero(),
    }
}

/// Key image of the legacy text form: padding and leading zeros become
/// spaces and negative numbers have their digits complemented.
fn legacy_sort_image(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() && (text[i].is_ascii_whitespace() || text[i] == b'+' || text[i] == b'0') {
        out.push(b' ');
        i += 1;
    }
    if i == text.len() {
        return out;
    }
    if text[i] == b'-' {
        out.push(1);
        for &c in &text[i + 1..] {
            out.push(if c.is_ascii_digit() { b'9' - c + b'0' } else { c });
        }
    } else {
        out.extend_from_slice(&text[i..]);
    }
    out
}

// -------------------------------------------------------------------------
// Family entry points

pub(crate) fn store_str(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    let parsed = DecimalDigits::parse(s);
    if parsed.error.contains(DecimalError::BAD_NUM) {
        reset(f, row);
        f.warn(
            row,
            WarningLevel::Warning,
            WarningCode::TruncatedWrongValue,
            format!("Incorrect {} value: '{}'", type_word(f), lossy(s)),
        );
        return ConversionStatus::ErrBadValue;
    }
    let mut status = match f.kind {
        FieldKind::Int { .. } => {
            let (rounded, _) = parsed.value.round_to(0);
            store_int_value(f, row, digits_to_i128(&rounded))
        }
        FieldKind::Float { .. } | FieldKind::Double { .. } => {
            let prefix = &s[..parsed.end.min(s.len())];
            let nr = std::str::from_utf8(prefix)
                .ok()
                .and_then(|t| t.trim().parse::<f64>().ok())
                .unwrap_or_else(|| parsed.value.to_f64());
            store_real_value(f, row, nr)
        }
        _ => store_digits(f, row, &parsed.value),
    };
    if parsed.error.contains(DecimalError::TRUNCATED) && !status.is_error() && status != ConversionStatus::WarnOutOfRange {
        f.warn(
            row,
            WarningLevel::Warning,
            WarningCode::DataTruncated,
            format!("Data truncated for value '{}'", lossy(s)),
        );
        status = ConversionStatus::WarnTruncated;
    }
    status
}

pub(crate) fn store_real(f: &Field, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
    match f.kind {
        FieldKind::Int { .. } => {
            if nr.is_nan() {
                write_int_image(f, row, 0);
                f.warn_status(row, ConversionStatus::WarnOutOfRange);
                return ConversionStatus::WarnOutOfRange;
            }
            store_int_value(f, row, nr.round_ties_even() as i128)
        }
        FieldKind::Float { .. } | FieldKind::Double { .. } => store_real_value(f, row, nr),
        _ => {
            if nr.is_nan() {
                store_digits(f, row, &DecimalDigits::zero());
                f.warn_status(row, ConversionStatus::WarnOutOfRange);
                return ConversionStatus::WarnOutOfRange;
            }
            let (value, err) = DecimalDigits::from_f64(nr);
            if err.contains(DecimalError::OVERFLOW) {
                let huge = DecimalDigits {
                    negative: nr < 0.0,
                    int: vec![9; 100],
                    frac: Vec::new(),
                };
                return store_digits(f, row, &huge);
            }
            store_digits(f, row, &value)
        }
    }
}

pub(crate) fn store_int(f: &Field, row: &mut RowBuffer, nr: i64, unsigned: bool) -> ConversionStatus {
    let v = if unsigned { nr as u64 as i128 } else { nr as i128 };
    match f.kind {
        FieldKind::Int { .. } => store_int_value(f, row, v),
        FieldKind::Float { .. } | FieldKind::Double { .. } => store_real_value(f, row, v as f64),
        _ => {
            let digits = if unsigned {
                DecimalDigits::from_u64(nr as u64)
            } else {
                DecimalDigits::from_i64(nr)
            };
            store_digits(f, row, &digits)
        }
    }
}

pub(crate) fn store_decimal(f: &Field, row: &mut RowBuffer, value: &DecimalDigits) -> ConversionStatus {
    match f.kind {
        FieldKind::Int { .. } => {
            let (rounded, _) = value.round_to(0);
            store_int_value(f, row, digits_to_i128(&rounded))
        }
        FieldKind::Float { .. } | FieldKind::Double { .. } => store_real_value(f, row, value.to_f64()),
        _ => store_digits(f, row, value),
    }
}

pub(crate) fn val_int(f: &Field, r: RecordRef<'_>) -> i64 {
    match f.kind {
        FieldKind::Int { .. } => read_int_image(f, r) as i64,
        FieldKind::Float { .. } | FieldKind::Double { .. } => read_real_image(f, r).round_ties_even() as i64,
        _ => read_digits(f, r).to_i64(f.is_unsigned()).0,
    }
}

pub(crate) fn val_real(f: &Field, r: RecordRef<'_>) -> f64 {
    match f.kind {
        FieldKind::Int { .. } => read_int_image(f, r) as f64,
        FieldKind::Float { .. } | FieldKind::Double { .. } => read_real_image(f, r),
        _ => read_digits(f, r).to_f64(),
    }
}

pub(crate) fn val_decimal(f: &Field, r: RecordRef<'_>) -> DecimalDigits {
    match f.kind {
        FieldKind::Int { unsigned, .. } => {
            let v = read_int_image(f, r);
            if unsigned {
                DecimalDigits::from_u64(v as u64)
            } else {
                DecimalDigits::from_i64(v as i64)
            }
        }
        FieldKind::Float { .. } | FieldKind::Double { .. } => DecimalDigits::from_f64(read_real_image(f, r)).0,
        _ => read_digits(f, r),
    }
}

pub(crate) fn val_str<'a>(f: &Field, r: RecordRef<'a>) -> Cow<'a, [u8]> {
    match f.kind {
        FieldKind::Int { zerofill, .. } => {
            let v = read_int_image(f, r);
            let text = if zerofill {
                format!("{:0>width$}", v, width = f.field_length as usize)
            } else {
                v.to_string()
            };
            Cow::Owned(text.into_bytes())
        }
        FieldKind::Float { dec, .. } | FieldKind::Double { dec, .. } => {
            let v = read_real_image(f, r);
            let text = if dec < NOT_FIXED_DEC {
                format!("{:.*}", dec as usize, v)
            } else {
                format_real(v, matches!(f.kind, FieldKind::Float { .. }))
            };
            Cow::Owned(text.into_bytes())
        }
        FieldKind::Decimal { zerofill, .. } => {
            let raw = r.bytes(f.field_length as usize);
            if zerofill {
                Cow::Borrowed(raw)
            } else {
                let start = raw.iter().position(|&b| b != b' ').unwrap_or(raw.len());
                Cow::Borrowed(&raw[start..])
            }
        }
        FieldKind::NewDecimal { dec, .. } => Cow::Owned(read_digits(f, r).to_text(dec as usize).into_bytes()),
        _ => Cow::Borrowed(&[]),
    }
}

pub(crate) fn cmp(f: &Field, a: RecordRef<'_>, b: RecordRef<'_>) -> Ordering {
    match f.kind {
        FieldKind::Int { .. } => read_int_image(f, a).cmp(&read_int_image(f, b)),
        FieldKind::Float { .. } | FieldKind::Double { .. } => read_real_image(f, a)
            .partial_cmp(&read_real_image(f, b))
            .unwrap_or(Ordering::Equal),
        FieldKind::Decimal { .. } => {
            let len = f.field_length as usize;
            legacy_sort_image(a.bytes(len)).cmp(&legacy_sort_image(b.bytes(len)))
        }
        FieldKind::NewDecimal { .. } => {
            let len = f.pack_length();
            a.bytes(len).cmp(b.bytes(len))
        }
        _ => Ordering::Equal,
    }
}

pub(crate) fn make_sort_key(f: &Field, r: RecordRef<'_>, to: &mut [u8]) {
    match f.kind {
        FieldKind::Int { width, unsigned, .. } => {
            codec::copy_integer(to, r.bytes(width.bytes()), !r.low_byte_first(), unsigned)
        }
        FieldKind::Float { .. } => codec::fill_key(to, &codec::sortable_f32(read_real_image(f, r) as f32)),
        FieldKind::Double { .. } => codec::fill_key(to, &codec::sortable_f64(read_real_image(f, r))),
        FieldKind::Decimal { .. } => {
            let image = legacy_sort_image(r.bytes(f.field_length as usize));
            codec::fill_key(to, &image)
        }
        FieldKind::NewDecimal { .. } => codec::fill_key(to, r.bytes(f.pack_length())),
        _ => to.fill(0),
    }
}

pub(crate) fn unpack(
    f: &Field,
    row: &mut RowBuffer,
    from: &[u8],
    param_data: u32,
    low_byte_first: bool,
) -> Result<usize, FieldError> {
    if let FieldKind::NewDecimal { precision, dec, .. } = f.kind {
        let sp = (param_data >> 8) as u8;
        let sd = (param_data & 0xFF) as u8;
        if param_data != 0 && (sp != precision || sd != dec) {
            let len = decimal::bin_size(sp, sd);
            need(from, len, &f.name)?;
            let value = decimal::bin2decimal(&from[..len], sp, sd);
            let mut buf = vec![0u8; f.pack_length()];
            let err = decimal::decimal2bin(&value, precision, dec, &mut buf);
            if err.contains(DecimalError::OVERFLOW) {
                let max = DecimalDigits::max_value(precision, dec, value.negative);
                decimal::decimal2bin(&max, precision, dec, &mut buf);
            }
            let n = buf.len();
            row.slice_mut(f.ptr, n).copy_from_slice(&buf);
            return Ok(len);
        }
    }
    f.unpack_fixed(row, from, low_byte_first)
}

pub(crate) fn reset(f: &Field, row: &mut RowBuffer) -> ConversionStatus {
    match f.kind {
        FieldKind::Decimal { .. } | FieldKind::NewDecimal { .. } => {
            store_digits(f, row, &DecimalDigits::zero());
        }
        _ => {
            let len = f.pack_length();
            row.slice_mut(f.ptr, len).fill(0);
        }
    }
    ConversionStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::base::IntWidth;
    use crate::field::charset::BINARY;

    fn int(width: IntWidth, unsigned: bool) -> Field {
        Field::new("n", FieldKind::Int { width, unsigned, zerofill: false }, width.display_length(unsigned))
    }

    #[test]
    fn test_tiny_store_and_clamp() {
        let f = int(IntWidth::Tiny, false);
        let mut row = RowBuffer::new(1);
        assert_eq!(f.store_int(&mut row, 100, false), ConversionStatus::Ok);
        assert_eq!(f.val_int(&row), 100);
        assert_eq!(f.store_int(&mut row, 300, false), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_int(&row), 127);
        assert_eq!(f.store_int(&mut row, -300, false), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_int(&row), -128);
        assert_eq!(row.session().warnings().len(), 2);
    }

    #[test]
    fn test_unsigned_bigint_from_unsigned_source() {
        let f = int(IntWidth::LongLong, true);
        let mut row = RowBuffer::new(8);
        assert_eq!(f.store_int(&mut row, -1, true), ConversionStatus::Ok);
        assert_eq!(f.val_int(&row) as u64, u64::MAX);
        assert_eq!(f.val_string(&row), u64::MAX.to_string());
        assert_eq!(f.store_int(&mut row, -1, false), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_int(&row), 0);
    }

    #[test]
    fn test_int_from_text() {
        let f = int(IntWidth::Long, false);
        let mut row = RowBuffer::new(4);
        assert_eq!(f.store_str(&mut row, b" 42 ", &BINARY), ConversionStatus::Ok);
        assert_eq!(f.val_int(&row), 42);
        assert_eq!(f.store_str(&mut row, b"2.5", &BINARY), ConversionStatus::Ok);
        assert_eq!(f.val_int(&row), 3);
        assert_eq!(f.store_str(&mut row, b"12abc", &BINARY), ConversionStatus::WarnTruncated);
        assert_eq!(f.val_int(&row), 12);
        assert_eq!(f.store_str(&mut row, b"abc", &BINARY), ConversionStatus::ErrBadValue);
        assert_eq!(f.val_int(&row), 0);
        assert_eq!(f.store_str(&mut row, b"1e20", &BINARY), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_int(&row), i32::MAX as i64);
    }

    #[test]
    fn test_int_from_real_rounds_half_even() {
        let f = int(IntWidth::Short, false);
        let mut row = RowBuffer::new(2);
        f.store_f64(&mut row, 2.5);
        assert_eq!(f.val_int(&row), 2);
        f.store_f64(&mut row, -3.5);
        assert_eq!(f.val_int(&row), -4);
        assert_eq!(f.store_f64(&mut row, f64::NAN), ConversionStatus::WarnOutOfRange);
    }

    #[test]
    fn test_int_sort_key_orders_signed_values() {
        let f = int(IntWidth::Long, false);
        let mut row = RowBuffer::new(4);
        let mut keys = Vec::new();
        for v in [-5i64, -1, 0, 7, 1 << 20] {
            f.store_int(&mut row, v, false);
            let mut k = [0u8; 4];
            f.make_sort_key(&row, &mut k);
            keys.push(k);
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_fixed_double_rounds_and_clamps() {
        let f = Field::new("d", FieldKind::Double { dec: 2, unsigned: false }, 5);
        let mut row = RowBuffer::new(8);
        assert_eq!(f.store_f64(&mut row, 1.234), ConversionStatus::NoteTruncated);
        assert_eq!(f.val_string(&row), "1.23");
        assert_eq!(f.store_f64(&mut row, 1234.5), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_string(&row), "999.99");
    }

    #[test]
    fn test_unsigned_float_rejects_negative() {
        let f = Field::new("f", FieldKind::Float { dec: NOT_FIXED_DEC, unsigned: true }, 12);
        let mut row = RowBuffer::new(4);
        assert_eq!(f.store_f64(&mut row, -1.5), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_real(&row), 0.0);
        assert_eq!(f.store_str(&mut row, b"2.5x", &BINARY), ConversionStatus::WarnTruncated);
        assert_eq!(f.val_real(&row), 2.5);
    }

    #[test]
    fn test_legacy_decimal_text_image() {
        let f = Field::new(
            "d",
            FieldKind::Decimal {
                dec: 2,
                unsigned: false,
                zerofill: false,
            },
            7,
        );
        let mut row = RowBuffer::new(7);
        assert_eq!(f.store_str(&mut row, b"-12.5", &BINARY), ConversionStatus::Ok);
        assert_eq!(row.bytes(), b" -12.50");
        assert_eq!(f.val_string(&row), "-12.50");
        assert_eq!(f.store_str(&mut row, b"123456", &BINARY), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_string(&row), "9999.99");
    }

    #[test]
    fn test_legacy_sort_image_orders_negatives() {
        let a = legacy_sort_image(b" -12.5");
        let b = legacy_sort_image(b"  -3.0");
        let c = legacy_sort_image(b"   0.5");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_newdecimal_overflow_stores_max() {
        let f = Field::new(
            "d",
            FieldKind::NewDecimal {
                precision: 5,
                dec: 2,
                unsigned: false,
            },
            7,
        );
        let mut row = RowBuffer::new(f.pack_length());
        assert_eq!(f.store_str(&mut row, b"1234.567", &BINARY), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_string(&row), "999.99");
        assert_eq!(f.store_str(&mut row, b"-1.005", &BINARY), ConversionStatus::NoteTruncated);
        assert_eq!(f.val_string(&row), "-1.01");
    }

    #[test]
    fn test_newdecimal_unsigned_negative() {
        let f = Field::new(
            "d",
            FieldKind::NewDecimal {
                precision: 4,
                dec: 1,
                unsigned: true,
            },
            5,
        );
        let mut row = RowBuffer::new(f.pack_length());
        assert_eq!(f.store_int(&mut row, -5, false), ConversionStatus::WarnOutOfRange);
        assert_eq!(f.val_string(&row), "0.0");
    }

    #[test]
    fn test_newdecimal_unpack_rescales() {
        let src = Field::new(
            "s",
            FieldKind::NewDecimal {
                precision: 10,
                dec: 4,
                unsigned: false,
            },
            12,
        );
        let dst = Field::new(
            "d",
            FieldKind::NewDecimal {
                precision: 8,
                dec: 2,
                unsigned: false,
            },
            10,
        );
        let mut a = RowBuffer::new(src.pack_length());
        src.store_str(&mut a, b"123.4567", &BINARY);
        let mut wire = Vec::new();
        src.pack(&a, &mut wire, usize::MAX, true);
        let mut b = RowBuffer::new(dst.pack_length());
        let used = dst.unpack(&mut b, &wire, src.own_param_data(), true).unwrap();
        assert_eq!(used, wire.len());
        assert_eq!(dst.val_string(&b), "123.46");
    }

    #[test]
    fn test_unpack_truncated_input() {
        let f = int(IntWidth::Long, false);
        let mut row = RowBuffer::new(4);
        assert!(f.unpack(&mut row, &[1, 2], 0, true).is_err());
    }
}
