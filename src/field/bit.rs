//! BIT(N) columns.
//!
//! The value is an unsigned integer of N bits. Its low `8 * bytes_in_rec`
//! bits are stored big-endian at the field position. When the table stores
//! the remaining `N % 8` high bits in the null bitmap the field carries a
//! [`BitRange`](crate::field::row::BitRange) for them; otherwise the record
//! holds all `(N + 7) / 8` bytes.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::field::base::{need, Field, FieldKind, RecordRef};
use crate::field::codec;
use crate::field::decimal::DecimalDigits;
use crate::field::row::RowBuffer;
use crate::field::status::{ConversionStatus, DecimalError};
use crate::FieldError;

fn max_value(f: &Field) -> u64 {
    if f.field_length >= 64 {
        u64::MAX
    } else {
        (1u64 << f.field_length) - 1
    }
}

fn be_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn be_bytes(v: u64, len: usize) -> Vec<u8> {
    let all = v.to_be_bytes();
    let mut out = vec![0u8; len.saturating_sub(8)];
    out.extend_from_slice(&all[8 - len.min(8)..]);
    out
}

fn read_value(f: &Field, r: RecordRef<'_>) -> u64 {
    let FieldKind::Bit { bytes_in_rec, bits, .. } = f.kind else {
        return 0;
    };
    let mut v = be_value(r.bytes(bytes_in_rec));
    if let Some(range) = bits {
        let range = range.shifted(r.ptr as isize - f.ptr as isize);
        let high = r.row.get_rec_bits(range) as u64;
        if bytes_in_rec < 8 {
            v |= high << (8 * bytes_in_rec);
        }
    }
    v
}

fn write_value(f: &Field, row: &mut RowBuffer, v: u64) {
    let FieldKind::Bit { bytes_in_rec, bits, .. } = f.kind else {
        return;
    };
    row.slice_mut(f.ptr, bytes_in_rec)
        .copy_from_slice(&be_bytes(v, bytes_in_rec));
    if let Some(range) = bits {
        let high = if bytes_in_rec >= 8 { 0 } else { v >> (8 * bytes_in_rec) };
        row.set_rec_bits(range, high as u8);
    }
}

/// Store `v`, saturating to all ones when it has more bits than the column.
fn store_value(f: &Field, row: &mut RowBuffer, v: Option<u64>) -> ConversionStatus {
    let max = max_value(f);
    match v {
        Some(v) if v <= max => {
            write_value(f, row, v);
            ConversionStatus::Ok
        }
        _ => {
            write_value(f, row, max);
            f.warn_status(row, ConversionStatus::WarnOutOfRange);
            ConversionStatus::WarnOutOfRange
        }
    }
}

/// Interpret `s` as a big-endian binary value.
pub(crate) fn store_str(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    let start = s.iter().position(|&b| b != 0).unwrap_or(s.len());
    let digits = &s[start..];
    let v = if digits.len() > 8 {
        None
    } else {
        Some(be_value(digits))
    };
    store_value(f, row, v)
}

pub(crate) fn store_int(f: &Field, row: &mut RowBuffer, nr: i64, _unsigned: bool) -> ConversionStatus {
    store_value(f, row, Some(nr as u64))
}

pub(crate) fn store_real(f: &Field, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
    let v = if nr.is_nan() { 0 } else { nr as i64 };
    store_int(f, row, v, false)
}

pub(crate) fn store_decimal(f: &Field, row: &mut RowBuffer, value: &DecimalDigits) -> ConversionStatus {
    let (v, err) = value.to_i64(true);
    if err.contains(DecimalError::OVERFLOW) {
        return store_value(f, row, None);
    }
    store_int(f, row, v, true)
}

pub(crate) fn val_int(f: &Field, r: RecordRef<'_>) -> i64 {
    read_value(f, r) as i64
}

pub(crate) fn val_str<'a>(f: &Field, r: RecordRef<'a>) -> Cow<'a, [u8]> {
    Cow::Owned(be_bytes(read_value(f, r), f.pack_length()))
}

pub(crate) fn cmp(f: &Field, a: RecordRef<'_>, b: RecordRef<'_>) -> Ordering {
    read_value(f, a).cmp(&read_value(f, b))
}

pub(crate) fn make_sort_key(f: &Field, r: RecordRef<'_>, to: &mut [u8]) {
    codec::fill_key(to, &be_bytes(read_value(f, r), f.pack_length()));
}

pub(crate) fn pack(f: &Field, r: RecordRef<'_>, to: &mut Vec<u8>) {
    to.extend_from_slice(&be_bytes(read_value(f, r), f.pack_length()));
}

/// `param_data` is `bytes << 8 | bits` of the source column.
pub(crate) fn unpack(f: &Field, row: &mut RowBuffer, from: &[u8], param_data: u32) -> Result<usize, FieldError> {
    let from_len = if param_data == 0 {
        f.pack_length()
    } else {
        ((param_data >> 8) + ((param_data & 0xFF) > 0) as u32) as usize
    };
    need(from, from_len, &f.name)?;
    let image = &from[..from_len];
    let start = image.iter().position(|&b| b != 0).unwrap_or(image.len());
    let v = if image.len() - start > 8 {
        u64::MAX
    } else {
        be_value(&image[start..])
    };
    write_value(f, row, v.min(max_value(f)));
    Ok(from_len)
}

pub(crate) fn reset(f: &Field, row: &mut RowBuffer) -> ConversionStatus {
    write_value(f, row, 0);
    ConversionStatus::Ok
}
