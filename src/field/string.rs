//! Character and binary string columns.
//!
//! | Kind      | Record image                                           |
//! |-----------|--------------------------------------------------------|
//! | CHAR      | `field_length` bytes, padded with the pad character    |
//! | VARCHAR   | 1- or 2-byte little-endian length, then the data       |
//! | BLOB/TEXT | `packlength`-byte length, then an 8-byte arena handle  |
//! | ENUM/SET  | unsigned integer of `packlength` bytes                 |
//!
//! Text is copied as-is (no character set conversion) but always cut at a
//! well-formed boundary of the column's character set.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::field::base::{need, Field, FieldKind, RecordRef};
use crate::field::charset::{self, test_if_important_data, CharsetInfo};
use crate::field::codec;
use crate::field::decimal::DecimalDigits;
use crate::field::doc_field;
use crate::field::row::RowBuffer;
use crate::field::session::CheckLevel;
use crate::field::status::{ConversionStatus, WarningCode, WarningLevel};
use crate::field::time::MysqlTime;
use crate::field::types::BLOB_HANDLE_BYTES;
use crate::FieldError;

/// How a stored text ended up shorter than its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cut {
    None,
    Invalid,
    Important,
    Spaces,
}

/// Longest well-formed prefix that fits both limits.
fn fit_text(cs: &CharsetInfo, s: &[u8], max_chars: usize, max_bytes: usize) -> (usize, Cut) {
    let wf = cs.well_formed_len(s, max_chars);
    let mut len = wf.len;
    let mut invalid = wf.invalid;
    if len > max_bytes {
        len = cs.well_formed_len(&s[..max_bytes], max_chars).len;
        invalid = false;
    }
    let cut = if len == s.len() {
        Cut::None
    } else if invalid {
        Cut::Invalid
    } else if cs.is_binary() || test_if_important_data(&s[len..]) {
        Cut::Important
    } else {
        Cut::Spaces
    };
    (len, cut)
}

fn report_cut(f: &Field, row: &mut RowBuffer, cut: Cut, s: &[u8], kept: usize) -> ConversionStatus {
    match cut {
        Cut::None => ConversionStatus::Ok,
        Cut::Invalid => {
            let bad: String = s[kept..].iter().take(6).map(|b| format!("\\x{:02X}", b)).collect();
            f.warn(
                row,
                WarningLevel::Warning,
                WarningCode::TruncatedWrongValue,
                format!("Incorrect string value: '{}'", bad),
            );
            ConversionStatus::WarnTruncated
        }
        Cut::Important => {
            f.warn(row, WarningLevel::Warning, WarningCode::DataTruncated, "Data too long for column");
            ConversionStatus::WarnTruncated
        }
        Cut::Spaces => {
            f.warn(row, WarningLevel::Note, WarningCode::DataTruncated, "Data truncated");
            ConversionStatus::NoteTruncated
        }
    }
}

/// Source CHAR length encoded in replication metadata.
pub(crate) fn char_from_length(param: u32) -> usize {
    ((((param >> 4) & 0x300) ^ 0x300) + (param & 0xFF)) as usize
}

fn blob_parts(f: &Field) -> Option<(usize, &'static CharsetInfo)> {
    match f.kind {
        FieldKind::Blob { charset, packlength, .. } => Some((packlength as usize, charset)),
        FieldKind::Document => Some((f.pack_length_in_rec(), &charset::BINARY)),
        _ => None,
    }
}

fn read_blob<'a>(f: &Field, r: RecordRef<'a>) -> &'a [u8] {
    let Some((pl, _)) = blob_parts(f) else {
        return &[];
    };
    let len = codec::read_uint(r.bytes(pl), pl, r.low_byte_first()) as usize;
    let mut handle = [0u8; 8];
    handle.copy_from_slice(r.row.slice(r.ptr + pl, BLOB_HANDLE_BYTES));
    let data = r.row.blob(u64::from_le_bytes(handle));
    &data[..len.min(data.len())]
}

/// Arena handle held by the blob column whose record image starts at `ptr`.
pub(crate) fn blob_handle_at(f: &Field, row: &RowBuffer, ptr: usize) -> Option<u64> {
    let (pl, _) = blob_parts(f)?;
    let mut handle = [0u8; 8];
    handle.copy_from_slice(row.slice(ptr + pl, BLOB_HANDLE_BYTES));
    Some(u64::from_le_bytes(handle))
}

/// Replace the payload of a blob column with `data`, releasing the payload
/// it held before.
pub(crate) fn write_blob(f: &Field, row: &mut RowBuffer, data: Vec<u8>) {
    let Some((pl, _)) = blob_parts(f) else {
        return;
    };
    if let Some(old) = blob_handle_at(f, row, f.ptr) {
        row.release_blob(old);
    }
    let len = data.len();
    let handle = if data.is_empty() { 0 } else { row.alloc_blob(data) };
    let lbf = row.low_byte_first();
    codec::write_uint(row.slice_mut(f.ptr, pl), len as u64, pl, lbf);
    row.slice_mut(f.ptr + pl, BLOB_HANDLE_BYTES)
        .copy_from_slice(&handle.to_le_bytes());
}

fn varstring_data<'a>(f: &Field, r: RecordRef<'a>) -> &'a [u8] {
    let FieldKind::Varstring { length_bytes, .. } = f.kind else {
        return &[];
    };
    let lb = length_bytes as usize;
    let len = codec::read_uint(r.bytes(lb), lb, true) as usize;
    r.row.slice(r.ptr + lb, len.min(f.field_length as usize))
}

fn write_varstring(f: &Field, row: &mut RowBuffer, data: &[u8]) {
    let FieldKind::Varstring { length_bytes, .. } = f.kind else {
        return;
    };
    let lb = length_bytes as usize;
    let n = data.len().min(f.field_length as usize);
    codec::write_uint(row.slice_mut(f.ptr, lb), n as u64, lb, true);
    row.slice_mut(f.ptr + lb, n).copy_from_slice(&data[..n]);
}

/// Stored payload length of a VARCHAR or BLOB value.
pub(crate) fn stored_length(f: &Field, r: RecordRef<'_>) -> usize {
    match f.kind {
        FieldKind::Varstring { .. } => varstring_data(f, r).len(),
        FieldKind::Blob { .. } | FieldKind::Document => read_blob(f, r).len(),
        _ => f.pack_length(),
    }
}

// -------------------------------------------------------------------------
// ENUM and SET

fn typelib(f: &Field) -> &[String] {
    match &f.kind {
        FieldKind::Enum { values, .. } | FieldKind::Set { values, .. } => values,
        _ => &[],
    }
}

fn read_index(f: &Field, r: RecordRef<'_>) -> u64 {
    let n = f.pack_length();
    codec::read_uint(r.bytes(n), n, r.low_byte_first())
}

fn write_index(f: &Field, row: &mut RowBuffer, v: u64) {
    let n = f.pack_length();
    let lbf = row.low_byte_first();
    codec::write_uint(row.slice_mut(f.ptr, n), v, n, lbf);
}

fn set_mask(count: usize) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

/// Parse an all-digit number, as used for ENUM/SET numeric fallbacks.
fn parse_plain_number(s: &[u8]) -> Option<u64> {
    let t = std::str::from_utf8(s).ok()?.trim();
    if t.is_empty() || t.len() > 20 || !t.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse().ok()
}

fn warn_truncated(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    f.warn(
        row,
        WarningLevel::Warning,
        WarningCode::DataTruncated,
        format!("Data truncated for value '{}'", String::from_utf8_lossy(s)),
    );
    ConversionStatus::WarnTruncated
}

fn enum_store_str(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    let cs = f.charset();
    let values = typelib(f);
    let trimmed = &s[..cs.lengthsp(s)];
    let found = values
        .iter()
        .position(|v| cs.strnncollsp(v.as_bytes(), trimmed) == Ordering::Equal)
        .map(|i| i as u64 + 1)
        .or_else(|| parse_plain_number(s).filter(|&n| n <= values.len() as u64));
    match found {
        Some(idx) => {
            write_index(f, row, idx);
            ConversionStatus::Ok
        }
        None => {
            write_index(f, row, 0);
            warn_truncated(f, row, s)
        }
    }
}

fn set_store_str(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    let cs = f.charset();
    let values = typelib(f);
    let mut bits = 0u64;
    let mut bad = false;
    if !s.is_empty() {
        for part in s.split(|&b| b == b',') {
            let part = &part[..cs.lengthsp(part)];
            match values
                .iter()
                .position(|v| cs.strnncollsp(v.as_bytes(), part) == Ordering::Equal)
            {
                Some(i) if i < 64 => bits |= 1 << i,
                _ => bad = true,
            }
        }
    }
    if bits == 0 && !s.is_empty() && s.len() < 22 {
        return match parse_plain_number(s).filter(|&n| n & !set_mask(values.len()) == 0) {
            Some(n) => {
                write_index(f, row, n);
                ConversionStatus::Ok
            }
            None => {
                write_index(f, row, 0);
                warn_truncated(f, row, s)
            }
        };
    }
    write_index(f, row, bits);
    if bad {
        warn_truncated(f, row, s)
    } else {
        ConversionStatus::Ok
    }
}

fn typelib_store_int(f: &Field, row: &mut RowBuffer, nr: i64, unsigned: bool) -> ConversionStatus {
    let count = typelib(f).len();
    let negative = !unsigned && nr < 0;
    let v = nr as u64;
    match f.kind {
        FieldKind::Enum { .. } => {
            if negative || v > count as u64 {
                write_index(f, row, 0);
                return warn_truncated(f, row, nr.to_string().as_bytes());
            }
            write_index(f, row, v);
            if v == 0 && row.config().check_level != CheckLevel::Ignore {
                return warn_truncated(f, row, b"0");
            }
            ConversionStatus::Ok
        }
        _ => {
            let mask = set_mask(count);
            if negative || v & !mask != 0 {
                write_index(f, row, v & mask);
                return warn_truncated(f, row, nr.to_string().as_bytes());
            }
            write_index(f, row, v);
            ConversionStatus::Ok
        }
    }
}

fn typelib_text(f: &Field, v: u64) -> Vec<u8> {
    let values = typelib(f);
    match f.kind {
        FieldKind::Enum { .. } => {
            if v == 0 || v > values.len() as u64 {
                Vec::new()
            } else {
                values[v as usize - 1].as_bytes().to_vec()
            }
        }
        _ => values
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < 64 && v & (1u64 << i) != 0)
            .map(|(_, s)| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
            .into_bytes(),
    }
}

fn is_typelib(f: &Field) -> bool {
    matches!(f.kind, FieldKind::Enum { .. } | FieldKind::Set { .. })
}

// -------------------------------------------------------------------------
// Family entry points

pub(crate) fn store_str(f: &Field, row: &mut RowBuffer, s: &[u8], _cs: &CharsetInfo) -> ConversionStatus {
    match f.kind {
        FieldKind::Null => ConversionStatus::Ok,
        FieldKind::String { charset } => {
            let len = f.field_length as usize;
            let (n, cut) = fit_text(charset, s, f.char_length(), len);
            let dst = row.slice_mut(f.ptr, len);
            dst[..n].copy_from_slice(&s[..n]);
            dst[n..].fill(charset.pad_char());
            report_cut(f, row, cut, s, n)
        }
        FieldKind::Varstring { charset, .. } => {
            let (n, cut) = fit_text(charset, s, f.char_length(), f.field_length as usize);
            write_varstring(f, row, &s[..n]);
            report_cut(f, row, cut, s, n)
        }
        FieldKind::Blob { charset, .. } => {
            let max = f.max_data_length();
            let (n, cut) = fit_text(charset, s, usize::MAX, max);
            write_blob(f, row, s[..n].to_vec());
            report_cut(f, row, cut, s, n)
        }
        FieldKind::Enum { .. } => enum_store_str(f, row, s),
        FieldKind::Set { .. } => set_store_str(f, row, s),
        FieldKind::Document => doc_field::store_root(f, row, s),
        _ => ConversionStatus::Ok,
    }
}

pub(crate) fn store_real(f: &Field, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
    if is_typelib(f) {
        return typelib_store_int(f, row, nr.round_ties_even() as i64, false);
    }
    let text = format!("{}", nr);
    store_str(f, row, text.as_bytes(), &charset::BINARY)
}

pub(crate) fn store_int(f: &Field, row: &mut RowBuffer, nr: i64, unsigned: bool) -> ConversionStatus {
    if is_typelib(f) {
        return typelib_store_int(f, row, nr, unsigned);
    }
    let text = if unsigned {
        (nr as u64).to_string()
    } else {
        nr.to_string()
    };
    store_str(f, row, text.as_bytes(), &charset::BINARY)
}

pub(crate) fn store_decimal(f: &Field, row: &mut RowBuffer, value: &DecimalDigits) -> ConversionStatus {
    if is_typelib(f) {
        let (v, _) = value.to_i64(true);
        return typelib_store_int(f, row, v, true);
    }
    let text = value.to_text(value.frac.len());
    store_str(f, row, text.as_bytes(), &charset::BINARY)
}

pub(crate) fn store_time(f: &Field, row: &mut RowBuffer, t: &MysqlTime, dec: u8) -> ConversionStatus {
    if is_typelib(f) {
        return typelib_store_int(f, row, t.to_number(), false);
    }
    let text = t.format(dec);
    store_str(f, row, text.as_bytes(), &charset::BINARY)
}

pub(crate) fn val_str<'a>(f: &Field, r: RecordRef<'a>) -> Cow<'a, [u8]> {
    match f.kind {
        FieldKind::String { charset } => {
            let raw = r.bytes(f.field_length as usize);
            if charset.is_binary() || r.row.config().sql_mode.pad_char_to_full_length {
                Cow::Borrowed(raw)
            } else {
                Cow::Borrowed(&raw[..charset.lengthsp(raw)])
            }
        }
        FieldKind::Varstring { .. } => Cow::Borrowed(varstring_data(f, r)),
        FieldKind::Blob { .. } | FieldKind::Document => Cow::Borrowed(read_blob(f, r)),
        FieldKind::Enum { .. } | FieldKind::Set { .. } => Cow::Owned(typelib_text(f, read_index(f, r))),
        _ => Cow::Borrowed(&[]),
    }
}

pub(crate) fn val_int(f: &Field, r: RecordRef<'_>) -> i64 {
    if is_typelib(f) {
        return read_index(f, r) as i64;
    }
    let mut v = DecimalDigits::parse(&val_str(f, r)).value;
    v.frac.clear();
    v.to_i64(false).0
}

pub(crate) fn val_real(f: &Field, r: RecordRef<'_>) -> f64 {
    if is_typelib(f) {
        return read_index(f, r) as f64;
    }
    let text = val_str(f, r);
    let parsed = DecimalDigits::parse(&text);
    std::str::from_utf8(&text[..parsed.end.min(text.len())])
        .ok()
        .and_then(|t| t.trim().parse::<f64>().ok())
        .unwrap_or_else(|| parsed.value.to_f64())
}

pub(crate) fn val_decimal(f: &Field, r: RecordRef<'_>) -> DecimalDigits {
    if is_typelib(f) {
        return DecimalDigits::from_u64(read_index(f, r));
    }
    DecimalDigits::parse(&val_str(f, r)).value
}

pub(crate) fn cmp(f: &Field, a: RecordRef<'_>, b: RecordRef<'_>) -> Ordering {
    match f.kind {
        FieldKind::String { charset } => {
            let len = f.field_length as usize;
            charset.strnncollsp(a.bytes(len), b.bytes(len))
        }
        FieldKind::Varstring { charset, .. } => charset.strnncollsp(varstring_data(f, a), varstring_data(f, b)),
        FieldKind::Blob { charset, .. } => charset.strnncollsp(read_blob(f, a), read_blob(f, b)),
        FieldKind::Document => charset::BINARY.strnncollsp(read_blob(f, a), read_blob(f, b)),
        FieldKind::Enum { .. } | FieldKind::Set { .. } => read_index(f, a).cmp(&read_index(f, b)),
        _ => Ordering::Equal,
    }
}

/// Binary sort image: data zero-padded, then the big-endian length.
fn binary_length_key(to: &mut [u8], data: &[u8], length_bytes: usize) {
    let body = to.len().saturating_sub(length_bytes);
    codec::fill_key(&mut to[..body], data);
    let mut len = [0u8; 8];
    codec::write_uint(&mut len, data.len() as u64, 8, false);
    let tail = &mut to[body..];
    let n = tail.len();
    tail.copy_from_slice(&len[8 - n..]);
}

pub(crate) fn make_sort_key(f: &Field, r: RecordRef<'_>, to: &mut [u8]) {
    match f.kind {
        FieldKind::String { charset } => {
            charset.strnxfrm(to, r.bytes(f.field_length as usize));
        }
        FieldKind::Varstring { charset, length_bytes } => {
            let data = varstring_data(f, r);
            if charset.is_binary() {
                binary_length_key(to, data, length_bytes as usize);
            } else {
                charset.strnxfrm(to, data);
            }
        }
        FieldKind::Blob { charset, packlength, .. } => {
            let data = read_blob(f, r);
            if charset.is_binary() {
                binary_length_key(to, data, packlength as usize);
            } else {
                charset.strnxfrm(to, data);
            }
        }
        FieldKind::Document => binary_length_key(to, read_blob(f, r), f.pack_length_in_rec()),
        FieldKind::Enum { .. } | FieldKind::Set { .. } => {
            let n = f.pack_length();
            codec::copy_integer(to, r.bytes(n), !r.low_byte_first(), true);
        }
        _ => to.fill(0),
    }
}

fn push_length(to: &mut Vec<u8>, len: usize, width: usize, low_byte_first: bool) {
    let start = to.len();
    to.resize(start + width, 0);
    codec::write_uint(&mut to[start..], len as u64, width, low_byte_first);
}

pub(crate) fn pack(f: &Field, r: RecordRef<'_>, to: &mut Vec<u8>, max_length: usize, low_byte_first: bool) {
    match f.kind {
        FieldKind::String { charset } => {
            let raw = r.bytes(f.field_length as usize);
            let len = charset.lengthsp(raw).min(max_length);
            push_length(to, len, if f.field_length > 255 { 2 } else { 1 }, true);
            to.extend_from_slice(&raw[..len]);
        }
        FieldKind::Varstring { length_bytes, .. } => {
            let data = varstring_data(f, r);
            let len = data.len().min(max_length);
            push_length(to, len, length_bytes as usize, true);
            to.extend_from_slice(&data[..len]);
        }
        FieldKind::Blob { .. } | FieldKind::Document => {
            let pl = f.pack_length_in_rec();
            let data = read_blob(f, r);
            let len = data.len().min(max_length);
            push_length(to, len, pl, low_byte_first);
            to.extend_from_slice(&data[..len]);
        }
        FieldKind::Enum { .. } | FieldKind::Set { .. } => {
            push_length(to, read_index(f, r) as usize, f.pack_length(), low_byte_first);
        }
        _ => {}
    }
}

pub(crate) fn unpack(
    f: &Field,
    row: &mut RowBuffer,
    from: &[u8],
    param_data: u32,
    low_byte_first: bool,
) -> Result<usize, FieldError> {
    match f.kind {
        FieldKind::String { charset } => {
            let from_len = if param_data == 0 {
                f.field_length as usize
            } else {
                char_from_length(param_data)
            };
            let width = if from_len > 255 { 2 } else { 1 };
            need(from, width, &f.name)?;
            let len = codec::read_uint(from, width, true) as usize;
            need(from, width + len, &f.name)?;
            let field_len = f.field_length as usize;
            let n = len.min(field_len);
            let dst = row.slice_mut(f.ptr, field_len);
            dst[..n].copy_from_slice(&from[width..width + n]);
            dst[n..].fill(charset.pad_char());
            Ok(width + len)
        }
        FieldKind::Varstring { length_bytes, .. } => {
            let width = if param_data == 0 {
                length_bytes as usize
            } else if param_data > 255 {
                2
            } else {
                1
            };
            need(from, width, &f.name)?;
            let len = codec::read_uint(from, width, true) as usize;
            need(from, width + len, &f.name)?;
            write_varstring(f, row, &from[width..width + len]);
            Ok(width + len)
        }
        FieldKind::Blob { .. } | FieldKind::Document => {
            let pl = if param_data == 0 {
                f.pack_length_in_rec()
            } else {
                (param_data & 0xFF) as usize
            };
            need(from, pl, &f.name)?;
            let len = codec::read_uint(from, pl, low_byte_first) as usize;
            need(from, pl + len, &f.name)?;
            let keep = len.min(f.max_data_length());
            write_blob(f, row, from[pl..pl + keep].to_vec());
            Ok(pl + len)
        }
        FieldKind::Enum { .. } | FieldKind::Set { .. } => {
            let width = if param_data == 0 {
                f.pack_length()
            } else {
                (param_data & 0xFF) as usize
            };
            need(from, width, &f.name)?;
            write_index(f, row, codec::read_uint(from, width, low_byte_first));
            Ok(width)
        }
        _ => Ok(0),
    }
}

pub(crate) fn reset(f: &Field, row: &mut RowBuffer) -> ConversionStatus {
    match f.kind {
        FieldKind::Null => ConversionStatus::Ok,
        FieldKind::String { charset } => {
            let len = f.field_length as usize;
            row.slice_mut(f.ptr, len).fill(charset.pad_char());
            ConversionStatus::Ok
        }
        FieldKind::Blob { geometry, .. } => {
            write_blob(f, row, Vec::new());
            if geometry && !f.maybe_null() {
                ConversionStatus::ErrNullConstraintViolation
            } else {
                ConversionStatus::Ok
            }
        }
        FieldKind::Document => {
            write_blob(f, row, Vec::new());
            ConversionStatus::Ok
        }
        _ => {
            let len = f.pack_length();
            row.slice_mut(f.ptr, len).fill(0);
            ConversionStatus::Ok
        }
    }
}
