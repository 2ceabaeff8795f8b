//! Copying values between fields.
//!
//! [`field_conv`] converts one value from any column type to any other.
//! [`CopyField`] picks a strategy once for a (from, to) pair so bulk copies
//! (temporary tables, sorting, grouping) skip the per-row type dispatch.

use std::fmt;

use tracing::debug;

use crate::field::base::{Field, FieldKind};
use crate::field::codec;
use crate::field::row::RowBuffer;
use crate::field::session::CheckLevel;
use crate::field::status::{ConversionStatus, WarningCode, WarningLevel};
use crate::field::string;
use crate::field::types::{flags, FieldType, ItemResult};

/// Store NULL into `to`.
///
/// A NOT NULL column is reset to its empty value instead; the session check
/// level decides whether that is silent, a warning, or an error.
pub fn set_field_to_null(to: &Field, row: &mut RowBuffer) -> ConversionStatus {
    if to.real_maybe_null() {
        to.set_null(row);
        to.reset(row);
        return ConversionStatus::Ok;
    }
    to.reset(row);
    null_into_not_null(to, row, WarningCode::DataTruncated)
}

fn null_into_not_null(to: &Field, row: &mut RowBuffer, code: WarningCode) -> ConversionStatus {
    match row.config().check_level {
        CheckLevel::Ignore => ConversionStatus::Ok,
        CheckLevel::Warn => {
            to.warn(row, WarningLevel::Warning, code, "NULL supplied to a NOT NULL column");
            ConversionStatus::Ok
        }
        CheckLevel::ErrorForNull => {
            to.warn(row, WarningLevel::Error, WarningCode::BadNull, "Column cannot be null");
            ConversionStatus::ErrNullConstraintViolation
        }
    }
}

/// Store NULL into `to` as an INSERT or UPDATE would.
///
/// A NOT NULL TIMESTAMP takes the current time and an auto-increment column
/// is left for the caller to number. With `no_conversions` a NOT NULL target
/// is always an error.
pub fn set_field_to_null_with_conversions(to: &Field, row: &mut RowBuffer, no_conversions: bool) -> ConversionStatus {
    if to.real_maybe_null() {
        to.set_null(row);
        to.reset(row);
        return ConversionStatus::Ok;
    }
    if no_conversions {
        return ConversionStatus::ErrNullConstraintViolation;
    }
    if to.field_type() == FieldType::Timestamp || to.field_type() == FieldType::Timestamp2 {
        return to.store_current_time(row);
    }
    to.reset(row);
    if to.flags & flags::AUTO_INCREMENT != 0 {
        return ConversionStatus::Ok;
    }
    null_into_not_null(to, row, WarningCode::BadNull)
}

fn is_blob(f: &Field) -> bool {
    matches!(f.kind, FieldKind::Blob { .. } | FieldKind::Document)
}

fn has_bitmap_bits(f: &Field) -> bool {
    matches!(f.kind, FieldKind::Bit { bits: Some(_), .. })
}

/// True when the record image of `from` can be copied byte for byte.
fn same_image(to: &Field, from: &Field) -> bool {
    to.eq_def(from) && !is_blob(to) && !has_bitmap_bits(to) && to.kind != FieldKind::Null
}

fn is_time_only(f: &Field) -> bool {
    matches!(f.field_type(), FieldType::Time | FieldType::Time2)
}

/// Copy a non-NULL value through the generic accessors.
fn convert(to: &Field, to_row: &mut RowBuffer, from: &Field, from_row: &RowBuffer) -> ConversionStatus {
    if to.kind == FieldKind::Null {
        return ConversionStatus::Ok;
    }
    if from.field_type().is_temporal() && to.field_type().is_temporal() {
        let value = if is_time_only(from) || is_time_only(to) {
            from.get_time(from_row)
        } else {
            from.get_date(from_row)
        };
        return match value {
            Some(t) => to.store_time(to_row, &t, from.decimals()),
            None => to.reset(to_row),
        };
    }
    let enum_like = matches!(from.kind, FieldKind::Enum { .. } | FieldKind::Set { .. });
    if enum_like && to.result_type() != ItemResult::String {
        return to.store_int(to_row, from.val_int(from_row), true);
    }
    match from.result_type() {
        ItemResult::String => {
            let text = from.val_str(from_row).into_owned();
            to.store_str(to_row, &text, from.charset())
        }
        ItemResult::Real => to.store_f64(to_row, from.val_real(from_row)),
        ItemResult::Decimal => to.store_decimal_digits(to_row, &from.val_decimal_digits(from_row)),
        ItemResult::Int => to.store_int(to_row, from.val_int(from_row), from.is_unsigned()),
    }
}

/// Copy the value of `from` into `to`, converting as needed.
///
/// Identical layouts in rows of the same byte order are copied raw; every
/// other pair goes through the source's natural accessor and the target's
/// matching store. NULL propagates through [`set_field_to_null`].
pub fn field_conv(to: &Field, to_row: &mut RowBuffer, from: &Field, from_row: &RowBuffer) -> ConversionStatus {
    if from.is_null(from_row) {
        return set_field_to_null(to, to_row);
    }
    to.set_notnull(to_row);
    if same_image(to, from) && to_row.low_byte_first() == from_row.low_byte_first() {
        let len = to.pack_length_in_rec();
        to_row
            .slice_mut(to.ptr, len)
            .copy_from_slice(from_row.slice(from.ptr, len));
        return ConversionStatus::Ok;
    }
    convert(to, to_row, from, from_row)
}

/// How a [`CopyField`] moves the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
    /// The target never holds a value.
    Skip,
    /// Raw copy of the record image.
    Bytes(usize),
    /// VARCHAR to VARCHAR: length prefix plus the used bytes, cut to fit.
    Varstring,
    /// CHAR to a wider CHAR in a single-byte charset: copy and pad.
    ExpandChar,
    /// CHAR to a narrower CHAR in a single-byte charset: cut, warning on
    /// lost non-space bytes.
    CutChar,
    /// Blob payload into the target's arena.
    Blob,
    /// Generic [`field_conv`].
    Convert,
}

/// How a [`CopyField`] treats NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullStrategy {
    /// Neither side is nullable.
    None,
    /// Both nullable: the NULL flag is carried over.
    NullToNull,
    /// Nullable into NOT NULL: a NULL resets the target with a warning.
    NullToNotNull,
    /// NOT NULL into nullable: the target is always marked not NULL.
    NotNullToNullable,
}

impl fmt::Display for CopyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyStrategy::Skip => write!(f, "skip"),
            CopyStrategy::Bytes(n) => write!(f, "bytes({})", n),
            CopyStrategy::Varstring => write!(f, "varstring"),
            CopyStrategy::ExpandChar => write!(f, "expand_char"),
            CopyStrategy::CutChar => write!(f, "cut_char"),
            CopyStrategy::Blob => write!(f, "blob"),
            CopyStrategy::Convert => write!(f, "convert"),
        }
    }
}

/// A precomputed copy from one field to another.
#[derive(Debug, Clone)]
pub struct CopyField {
    pub from: Field,
    pub to: Field,
    pub strategy: CopyStrategy,
    pub null_strategy: NullStrategy,
}

impl CopyField {
    pub fn new(to: &Field, from: &Field) -> CopyField {
        let strategy = Self::choose(to, from);
        let null_strategy = match (from.maybe_null(), to.maybe_null()) {
            (true, true) => NullStrategy::NullToNull,
            (true, false) => NullStrategy::NullToNotNull,
            (false, true) => NullStrategy::NotNullToNullable,
            (false, false) => NullStrategy::None,
        };
        debug!(
            from = %from.name,
            to = %to.name,
            strategy = %strategy,
            null = ?null_strategy,
            "copy strategy chosen"
        );
        CopyField {
            from: from.clone(),
            to: to.clone(),
            strategy,
            null_strategy,
        }
    }

    fn choose(to: &Field, from: &Field) -> CopyStrategy {
        if to.kind == FieldKind::Null {
            return CopyStrategy::Skip;
        }
        match (&to.kind, &from.kind) {
            (FieldKind::Varstring { charset: a, .. }, FieldKind::Varstring { charset: b, .. })
                if std::ptr::eq(*a, *b) =>
            {
                return CopyStrategy::Varstring
            }
            (FieldKind::String { charset: a }, FieldKind::String { charset: b })
                if std::ptr::eq(*a, *b) && a.mbmaxlen == 1 && to.field_length != from.field_length =>
            {
                return if to.field_length > from.field_length {
                    CopyStrategy::ExpandChar
                } else {
                    CopyStrategy::CutChar
                };
            }
            _ => {}
        }
        if is_blob(to) && to.real_type() == from.real_type() {
            return CopyStrategy::Blob;
        }
        if same_image(to, from) {
            return CopyStrategy::Bytes(to.pack_length_in_rec());
        }
        CopyStrategy::Convert
    }

    /// Copy one row's value.
    pub fn copy(&self, to_row: &mut RowBuffer, from_row: &RowBuffer) -> ConversionStatus {
        let from_null = self.from.is_null(from_row);
        match self.null_strategy {
            NullStrategy::NullToNull if from_null => {
                self.to.set_null(to_row);
                self.to.reset(to_row);
                return ConversionStatus::Ok;
            }
            NullStrategy::NullToNotNull if from_null => {
                if matches!(self.to.field_type(), FieldType::Timestamp | FieldType::Timestamp2) {
                    return self.to.store_current_time(to_row);
                }
                self.to.warn(
                    to_row,
                    WarningLevel::Warning,
                    WarningCode::DataTruncated,
                    "NULL supplied to a NOT NULL column",
                );
                self.to.reset(to_row);
                return ConversionStatus::Ok;
            }
            NullStrategy::NullToNull | NullStrategy::NotNullToNullable => self.to.set_notnull(to_row),
            _ => {}
        }
        self.copy_value(to_row, from_row)
    }

    fn copy_value(&self, to_row: &mut RowBuffer, from_row: &RowBuffer) -> ConversionStatus {
        let (to, from) = (&self.to, &self.from);
        let same_order = to_row.low_byte_first() == from_row.low_byte_first();
        match self.strategy {
            CopyStrategy::Skip => ConversionStatus::Ok,
            CopyStrategy::Bytes(len) if same_order => {
                to_row
                    .slice_mut(to.ptr, len)
                    .copy_from_slice(from_row.slice(from.ptr, len));
                ConversionStatus::Ok
            }
            CopyStrategy::Varstring => self.copy_varstring(to_row, from_row),
            CopyStrategy::ExpandChar => {
                let (n, m) = (from.field_length as usize, to.field_length as usize);
                let pad = to.charset().pad_char();
                let src = from_row.slice(from.ptr, n).to_vec();
                let dst = to_row.slice_mut(to.ptr, m);
                dst[..n].copy_from_slice(&src);
                dst[n..].fill(pad);
                ConversionStatus::Ok
            }
            CopyStrategy::CutChar => {
                let m = to.field_length as usize;
                let src = from_row.slice(from.ptr, from.field_length as usize);
                let lost = src[m..].iter().any(|&b| b != b' ');
                to_row.slice_mut(to.ptr, m).copy_from_slice(&src[..m]);
                if lost {
                    to.warn_status(to_row, ConversionStatus::WarnTruncated);
                    return ConversionStatus::WarnTruncated;
                }
                ConversionStatus::Ok
            }
            CopyStrategy::Blob => {
                let data = from.val_str(from_row).into_owned();
                if data.len() > to.max_data_length() {
                    return convert(to, to_row, from, from_row);
                }
                string::write_blob(to, to_row, data);
                ConversionStatus::Ok
            }
            CopyStrategy::Bytes(_) | CopyStrategy::Convert => convert(to, to_row, from, from_row),
        }
    }

    fn copy_varstring(&self, to_row: &mut RowBuffer, from_row: &RowBuffer) -> ConversionStatus {
        let (to, from) = (&self.to, &self.from);
        let (FieldKind::Varstring { length_bytes: flb, .. }, FieldKind::Varstring { length_bytes: tlb, .. }) =
            (&from.kind, &to.kind)
        else {
            return convert(to, to_row, from, from_row);
        };
        let (flb, tlb) = (*flb as usize, *tlb as usize);
        let len = codec::read_uint(from_row.slice(from.ptr, flb), flb, true) as usize;
        let data = from_row.slice(from.ptr + flb, len).to_vec();
        let fits = len <= to.field_length as usize
            && to.charset().well_formed_len(&data, to.char_length()).len == len;
        if !fits {
            // Cut on a character boundary with the usual warnings.
            return to.store_str(to_row, &data, from.charset());
        }
        codec::write_uint(to_row.slice_mut(to.ptr, tlb), len as u64, tlb, true);
        to_row.slice_mut(to.ptr + tlb, len).copy_from_slice(&data);
        ConversionStatus::Ok
    }
}

/// Run every copy, returning the worst status.
pub fn copy_row(copies: &[CopyField], to_row: &mut RowBuffer, from_row: &RowBuffer) -> ConversionStatus {
    copies
        .iter()
        .fold(ConversionStatus::Ok, |acc, c| acc.merge(c.copy(to_row, from_row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::base::IntWidth;
    use crate::field::charset::{CharsetInfo, LATIN1_SWEDISH_CI, UTF8MB4_GENERAL_CI};
    use crate::field::row::NullBit;
    use crate::field::session::FieldConfig;

    fn int(name: &str, width: IntWidth) -> Field {
        Field::new(
            name,
            FieldKind::Int {
                width,
                unsigned: false,
                zerofill: false,
            },
            11,
        )
    }

    fn chars(name: &str, len: u32) -> Field {
        Field::new(
            name,
            FieldKind::String {
                charset: &LATIN1_SWEDISH_CI,
            },
            len,
        )
    }

    #[test]
    fn test_field_conv_clamps() {
        let from = int("a", IntWidth::Long);
        let to = int("b", IntWidth::Tiny);
        let mut src = RowBuffer::new(4);
        let mut dst = RowBuffer::new(1);
        from.store_int(&mut src, 99999, false);
        assert_eq!(field_conv(&to, &mut dst, &from, &src), ConversionStatus::WarnOutOfRange);
        assert_eq!(to.val_int(&dst), 127);
    }

    #[test]
    fn test_field_conv_raw_copy_needs_same_byte_order() {
        let f = int("a", IntWidth::Long);
        let mut src = RowBuffer::new(4);
        f.store_int(&mut src, 0x01020304, false);
        let mut cfg = FieldConfig::default();
        cfg.low_byte_first = false;
        let mut dst = RowBuffer::with_config(4, cfg);
        assert_eq!(field_conv(&f, &mut dst, &f, &src), ConversionStatus::Ok);
        assert_eq!(dst.bytes(), &[1, 2, 3, 4]);
        assert_eq!(f.val_int(&dst), 0x01020304);
    }

    #[test]
    fn test_field_conv_string_to_number() {
        let from = chars("s", 6);
        let to = int("n", IntWidth::Long);
        let mut src = RowBuffer::new(6);
        let mut dst = RowBuffer::new(4);
        from.store_str(&mut src, b"42abc", &LATIN1_SWEDISH_CI);
        assert_eq!(field_conv(&to, &mut dst, &from, &src), ConversionStatus::WarnTruncated);
        assert_eq!(to.val_int(&dst), 42);
    }

    #[test]
    fn test_null_into_not_null() {
        let from = int("a", IntWidth::Long).with_null(NullBit::new(0, 1)).at(1);
        let to = int("b", IntWidth::Long);
        let mut src = RowBuffer::new(5);
        from.set_null(&mut src);
        let mut dst = RowBuffer::new(4);
        dst.bytes_mut().fill(7);
        assert_eq!(field_conv(&to, &mut dst, &from, &src), ConversionStatus::Ok);
        assert_eq!(to.val_int(&dst), 0);
        assert_eq!(dst.session().warnings().len(), 1);

        let mut cfg = FieldConfig::default();
        cfg.check_level = CheckLevel::ErrorForNull;
        let mut strict = RowBuffer::with_config(4, cfg);
        assert_eq!(set_field_to_null(&to, &mut strict), ConversionStatus::ErrNullConstraintViolation);
        assert_eq!(
            set_field_to_null_with_conversions(&to, &mut strict, true),
            ConversionStatus::ErrNullConstraintViolation
        );
    }

    #[test]
    fn test_auto_increment_null_is_left_to_caller() {
        let mut to = int("id", IntWidth::Long);
        to.flags |= flags::AUTO_INCREMENT;
        let mut cfg = FieldConfig::default();
        cfg.check_level = CheckLevel::ErrorForNull;
        let mut row = RowBuffer::with_config(4, cfg);
        assert_eq!(set_field_to_null_with_conversions(&to, &mut row, false), ConversionStatus::Ok);
        assert!(row.session().warnings().is_empty());
    }

    #[test]
    fn test_strategies() {
        let a = chars("a", 4);
        let b = chars("b", 8);
        assert_eq!(CopyField::new(&b, &a).strategy, CopyStrategy::ExpandChar);
        assert_eq!(CopyField::new(&a, &b).strategy, CopyStrategy::CutChar);
        assert_eq!(CopyField::new(&a, &a).strategy, CopyStrategy::Bytes(4));
        let t = int("t", IntWidth::Tiny);
        assert_eq!(CopyField::new(&t, &a).strategy, CopyStrategy::Convert);
        let v = Field::new(
            "v",
            FieldKind::Varstring {
                charset: &UTF8MB4_GENERAL_CI,
                length_bytes: 1,
            },
            8,
        );
        assert_eq!(CopyField::new(&v, &v).strategy, CopyStrategy::Varstring);
    }

    fn varchar(name: &str, cs: &'static CharsetInfo, chars: u32) -> Field {
        let len = chars * cs.mbmaxlen as u32;
        Field::new(
            name,
            FieldKind::Varstring {
                charset: cs,
                length_bytes: if len > 255 { 2 } else { 1 },
            },
            len,
        )
    }

    /// Copy `text` from `from` to `to` through the precomputed strategy and
    /// through `field_conv`, checking that both agree.
    fn copy_text(to: &Field, from: &Field, text: &[u8]) -> (ConversionStatus, String, usize) {
        let mut src = RowBuffer::new(from.pack_length());
        from.store_str(&mut src, text, from.charset());
        let copy = CopyField::new(to, from);
        assert_eq!(copy.strategy, CopyStrategy::Varstring);
        let mut dst = RowBuffer::new(to.pack_length());
        let status = copy.copy(&mut dst, &src);

        let mut conv = RowBuffer::new(to.pack_length());
        assert_eq!(field_conv(to, &mut conv, from, &src), status);
        assert_eq!(conv.bytes(), dst.bytes());
        (status, to.val_string(&dst), to.data_length(&dst))
    }

    #[test]
    fn test_varstring_copy_respects_char_limit() {
        let wide = varchar("a", &UTF8MB4_GENERAL_CI, 300);
        let narrow = varchar("b", &UTF8MB4_GENERAL_CI, 10);

        let (status, value, len) = copy_text(&narrow, &wide, &[b'x'; 20]);
        assert_eq!(status, ConversionStatus::WarnTruncated);
        assert_eq!(value, "x".repeat(10));
        assert_eq!(len, 10);

        let (status, value, len) = copy_text(&narrow, &wide, "é".repeat(11).as_bytes());
        assert_eq!(status, ConversionStatus::WarnTruncated);
        assert_eq!(value, "é".repeat(10));
        assert_eq!(len, 20);

        let (status, value, len) = copy_text(&narrow, &wide, "héllo".as_bytes());
        assert_eq!(status, ConversionStatus::Ok);
        assert_eq!(value, "héllo");
        assert_eq!(len, 6);
    }

    #[test]
    fn test_varstring_copy_single_byte() {
        let wide = varchar("a", &LATIN1_SWEDISH_CI, 8);
        let narrow = varchar("b", &LATIN1_SWEDISH_CI, 4);

        let (status, value, _) = copy_text(&narrow, &wide, b"abcdefgh");
        assert_eq!(status, ConversionStatus::WarnTruncated);
        assert_eq!(value, "abcd");

        let (status, value, len) = copy_text(&narrow, &wide, b"ab");
        assert_eq!(status, ConversionStatus::Ok);
        assert_eq!(value, "ab");
        assert_eq!(len, 2);

        let (status, value, _) = copy_text(&wide, &narrow, b"abcd");
        assert_eq!(status, ConversionStatus::Ok);
        assert_eq!(value, "abcd");
    }

    #[test]
    fn test_char_cut_and_expand() {
        let a = chars("a", 4);
        let b = chars("b", 8);
        let mut wide = RowBuffer::new(8);
        let mut narrow = RowBuffer::new(4);
        b.store_str(&mut wide, b"ab", &LATIN1_SWEDISH_CI);
        assert_eq!(CopyField::new(&a, &b).copy(&mut narrow, &wide), ConversionStatus::Ok);
        assert_eq!(narrow.bytes(), b"ab  ");
        b.store_str(&mut wide, b"abcdef", &LATIN1_SWEDISH_CI);
        assert_eq!(CopyField::new(&a, &b).copy(&mut narrow, &wide), ConversionStatus::WarnTruncated);
        assert_eq!(narrow.bytes(), b"abcd");
        assert_eq!(CopyField::new(&b, &a).copy(&mut wide, &narrow), ConversionStatus::Ok);
        assert_eq!(wide.bytes(), b"abcd    ");
    }

    #[test]
    fn test_copy_row_reports_worst() {
        let from_a = int("a", IntWidth::Long);
        let from_b = chars("b", 4).at(4);
        let to_a = int("a", IntWidth::Tiny);
        let to_b = int("b", IntWidth::Long).at(1);
        let mut src = RowBuffer::new(8);
        from_a.store_int(&mut src, 1000, false);
        from_b.store_str(&mut src, b"x", &LATIN1_SWEDISH_CI);
        let copies = vec![CopyField::new(&to_a, &from_a), CopyField::new(&to_b, &from_b)];
        let mut dst = RowBuffer::new(5);
        assert_eq!(copy_row(&copies, &mut dst, &src), ConversionStatus::ErrBadValue);
        assert_eq!(to_a.val_int(&dst), 127);
    }
}
