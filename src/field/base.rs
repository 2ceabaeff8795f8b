//! The field contract: a typed accessor bound to one span of a row buffer.
//!
//! A [`Field`] is plain metadata plus a binding (`ptr` and an optional
//! [`NullBit`]). All value operations take the [`RowBuffer`] explicitly, so a
//! field can be rebound to another record with [`Field::move_field`] or
//! [`Field::move_field_offset`] and cloned freely.
//!
//! The physical encodings form a closed set ([`FieldKind`]). Operations are
//! grouped by family and dispatched to the `numeric`, `string`, `temporal` and
//! `bit` modules; size, metadata and identity questions are answered here.

use std::borrow::Cow;
use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::field::charset::{self, CharsetInfo};
use crate::field::codec;
use crate::field::decimal::{self, DecimalDigits};
use crate::field::row::{offset_add, BitRange, NullBit, RowBuffer};
use crate::field::session::FieldConfig;
use crate::field::status::{ConversionStatus, WarningCode, WarningLevel};
use crate::field::time::{self, MysqlTime, TimeType, Timeval};
use crate::field::types::{
    blob_pack_length, flags, AutoInit, FieldType, ItemResult, KeyMaps, KeyType, BLOB_HANDLE_BYTES,
    KEY_BLOB_LENGTH, NOT_FIXED_DEC,
};
use crate::field::{bit, numeric, string, temporal};
use crate::FieldError;

/// Width of a fixed-size integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    Tiny,
    Short,
    Medium,
    Long,
    LongLong,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::Tiny => 1,
            IntWidth::Short => 2,
            IntWidth::Medium => 3,
            IntWidth::Long => 4,
            IntWidth::LongLong => 8,
        }
    }

    pub fn field_type(self) -> FieldType {
        match self {
            IntWidth::Tiny => FieldType::Tiny,
            IntWidth::Short => FieldType::Short,
            IntWidth::Medium => FieldType::Int24,
            IntWidth::Long => FieldType::Long,
            IntWidth::LongLong => FieldType::LongLong,
        }
    }

    /// Inclusive value range.
    pub fn range(self, unsigned: bool) -> (i128, i128) {
        let bits = self.bytes() as u32 * 8;
        if unsigned {
            (0, (1i128 << bits) - 1)
        } else {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        }
    }

    /// Default display width, as in `int(11)`.
    pub fn display_length(self, unsigned: bool) -> u32 {
        let (signed, unsigned_len) = match self {
            IntWidth::Tiny => (4, 3),
            IntWidth::Short => (6, 5),
            IntWidth::Medium => (9, 8),
            IntWidth::Long => (11, 10),
            IntWidth::LongLong => (20, 20),
        };
        if unsigned {
            unsigned_len
        } else {
            signed
        }
    }

    fn name(self) -> &'static str {
        match self {
            IntWidth::Tiny => "tinyint",
            IntWidth::Short => "smallint",
            IntWidth::Medium => "mediumint",
            IntWidth::Long => "int",
            IntWidth::LongLong => "bigint",
        }
    }
}

/// Date and time encodings; the `2` variants carry fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    NewDate,
    Time,
    Time2,
    DateTime,
    DateTime2,
    Timestamp,
    Timestamp2,
}

impl TemporalKind {
    pub fn has_date(self) -> bool {
        !matches!(self, TemporalKind::Time | TemporalKind::Time2)
    }

    pub fn is_timestamp(self) -> bool {
        matches!(self, TemporalKind::Timestamp | TemporalKind::Timestamp2)
    }

    pub fn is_fractional(self) -> bool {
        matches!(self, TemporalKind::Time2 | TemporalKind::DateTime2 | TemporalKind::Timestamp2)
    }

    /// Type of the values this column produces.
    pub fn time_type(self) -> TimeType {
        match self {
            TemporalKind::NewDate => TimeType::Date,
            TemporalKind::Time | TemporalKind::Time2 => TimeType::Time,
            _ => TimeType::DateTime,
        }
    }
}

/// Physical encoding of a column, with the parameters each encoding needs.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int {
        width: IntWidth,
        unsigned: bool,
        zerofill: bool,
    },
    Float {
        dec: u8,
        unsigned: bool,
    },
    Double {
        dec: u8,
        unsigned: bool,
    },
    /// Legacy right-justified ASCII decimal; `field_length` bytes wide.
    Decimal {
        dec: u8,
        unsigned: bool,
        zerofill: bool,
    },
    NewDecimal {
        precision: u8,
        dec: u8,
        unsigned: bool,
    },
    Year,
    Temporal {
        kind: TemporalKind,
        dec: u8,
    },
    /// Never holds a value.
    Null,
    /// Fixed-length CHAR/BINARY.
    String {
        charset: &'static CharsetInfo,
    },
    /// VARCHAR/VARBINARY with a 1- or 2-byte length prefix.
    Varstring {
        charset: &'static CharsetInfo,
        length_bytes: u8,
    },
    /// BLOB/TEXT/GEOMETRY: length prefix plus an out-of-line arena handle.
    Blob {
        charset: &'static CharsetInfo,
        packlength: u8,
        geometry: bool,
    },
    Enum {
        charset: &'static CharsetInfo,
        packlength: u8,
        values: Vec<String>,
    },
    Set {
        charset: &'static CharsetInfo,
        packlength: u8,
        values: Vec<String>,
    },
    /// BIT(N); with `bits` set the leftover `bit_len` high bits live in the
    /// null bitmap, otherwise the value is stored in whole bytes.
    Bit {
        bytes_in_rec: usize,
        bit_len: u8,
        bits: Option<BitRange>,
    },
    /// Root document column: a binary blob with a 3-byte length.
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Numeric,
    Str,
    Temporal,
    Bit,
}

/// A field value located in some record: the buffer plus a byte offset.
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
    pub row: &'a RowBuffer,
    pub ptr: usize,
}

impl<'a> RecordRef<'a> {
    pub fn bytes(&self, len: usize) -> &'a [u8] {
        self.row.slice(self.ptr, len)
    }

    pub fn low_byte_first(&self) -> bool {
        self.row.low_byte_first()
    }
}

/// A typed accessor over one column of a row buffer.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub table_name: String,
    pub kind: FieldKind,
    /// Display width: characters for numbers and temporals, bytes for
    /// strings, bits for BIT.
    pub field_length: u32,
    pub ptr: usize,
    pub null: Option<NullBit>,
    pub flags: u32,
    pub auto_init: AutoInit,
    pub key_maps: KeyMaps,
    pub field_index: usize,
}

impl Field {
    pub fn new(name: &str, kind: FieldKind, field_length: u32) -> Self {
        let mut field_flags = flags::NOT_NULL;
        match &kind {
            FieldKind::Int { unsigned, zerofill, .. } | FieldKind::Decimal { unsigned, zerofill, .. } => {
                if *unsigned {
                    field_flags |= flags::UNSIGNED;
                }
                if *zerofill {
                    field_flags |= flags::ZEROFILL;
                }
            }
            FieldKind::Float { unsigned, .. }
            | FieldKind::Double { unsigned, .. }
            | FieldKind::NewDecimal { unsigned, .. } => {
                if *unsigned {
                    field_flags |= flags::UNSIGNED;
                }
            }
            FieldKind::Blob { .. } | FieldKind::Document => field_flags |= flags::BLOB,
            FieldKind::Enum { .. } => field_flags |= flags::ENUM,
            FieldKind::Set { .. } => field_flags |= flags::SET,
            FieldKind::Temporal { kind, .. } if kind.is_timestamp() => field_flags |= flags::TIMESTAMP,
            _ => {}
        }
        Field {
            name: name.to_string(),
            table_name: String::new(),
            kind,
            field_length,
            ptr: 0,
            null: None,
            flags: field_flags,
            auto_init: AutoInit::None,
            key_maps: KeyMaps::default(),
            field_index: 0,
        }
    }

    /// Make the field nullable through `bit`.
    pub fn with_null(mut self, bit: NullBit) -> Self {
        self.null = Some(bit);
        self.flags &= !flags::NOT_NULL;
        self
    }

    /// Bind the field at `ptr`.
    pub fn at(mut self, ptr: usize) -> Self {
        self.ptr = ptr;
        self
    }

    pub(crate) fn family(&self) -> Family {
        match self.kind {
            FieldKind::Int { .. }
            | FieldKind::Float { .. }
            | FieldKind::Double { .. }
            | FieldKind::Decimal { .. }
            | FieldKind::NewDecimal { .. } => Family::Numeric,
            FieldKind::Year | FieldKind::Temporal { .. } => Family::Temporal,
            FieldKind::Bit { .. } => Family::Bit,
            FieldKind::Null
            | FieldKind::String { .. }
            | FieldKind::Varstring { .. }
            | FieldKind::Blob { .. }
            | FieldKind::Enum { .. }
            | FieldKind::Set { .. }
            | FieldKind::Document => Family::Str,
        }
    }

    pub fn image<'a>(&self, row: &'a RowBuffer) -> RecordRef<'a> {
        RecordRef { row, ptr: self.ptr }
    }

    // ---------------------------------------------------------------------
    // Identity

    /// Logical type code.
    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::Int { width, .. } => width.field_type(),
            FieldKind::Float { .. } => FieldType::Float,
            FieldKind::Double { .. } => FieldType::Double,
            FieldKind::Decimal { .. } => FieldType::Decimal,
            FieldKind::NewDecimal { .. } => FieldType::NewDecimal,
            FieldKind::Year => FieldType::Year,
            FieldKind::Temporal { kind, .. } => match kind {
                TemporalKind::NewDate => FieldType::Date,
                TemporalKind::Time | TemporalKind::Time2 => FieldType::Time,
                TemporalKind::DateTime | TemporalKind::DateTime2 => FieldType::DateTime,
                TemporalKind::Timestamp | TemporalKind::Timestamp2 => FieldType::Timestamp,
            },
            FieldKind::Null => FieldType::Null,
            FieldKind::String { .. } | FieldKind::Enum { .. } | FieldKind::Set { .. } => FieldType::String,
            FieldKind::Varstring { .. } => FieldType::Varchar,
            FieldKind::Blob { geometry: true, .. } => FieldType::Geometry,
            FieldKind::Blob { .. } => FieldType::Blob,
            FieldKind::Bit { .. } => FieldType::Bit,
            FieldKind::Document => FieldType::Document,
        }
    }

    /// Physical type code.
    pub fn real_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::Temporal { kind, .. } => match kind {
                TemporalKind::NewDate => FieldType::NewDate,
                TemporalKind::Time => FieldType::Time,
                TemporalKind::Time2 => FieldType::Time2,
                TemporalKind::DateTime => FieldType::DateTime,
                TemporalKind::DateTime2 => FieldType::DateTime2,
                TemporalKind::Timestamp => FieldType::Timestamp,
                TemporalKind::Timestamp2 => FieldType::Timestamp2,
            },
            FieldKind::Enum { .. } => FieldType::Enum,
            FieldKind::Set { .. } => FieldType::Set,
            _ => self.field_type(),
        }
    }

    /// Type code written to a replication table map.
    pub fn binlog_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::Temporal { kind, .. } if kind.is_fractional() => self.real_type(),
            _ => self.field_type(),
        }
    }

    pub fn result_type(&self) -> ItemResult {
        match &self.kind {
            FieldKind::Int { .. } | FieldKind::Year | FieldKind::Bit { .. } => ItemResult::Int,
            FieldKind::Float { .. } | FieldKind::Double { .. } | FieldKind::Decimal { .. } => ItemResult::Real,
            FieldKind::NewDecimal { .. } => ItemResult::Decimal,
            _ => ItemResult::String,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match &self.kind {
            FieldKind::Int { width, unsigned, .. } => match (width, unsigned) {
                (IntWidth::Tiny, false) => KeyType::Int8,
                (IntWidth::Tiny, true) => KeyType::Binary,
                (IntWidth::Short, false) => KeyType::ShortInt,
                (IntWidth::Short, true) => KeyType::UShortInt,
                (IntWidth::Medium, false) => KeyType::Int24,
                (IntWidth::Medium, true) => KeyType::UInt24,
                (IntWidth::Long, false) => KeyType::LongInt,
                (IntWidth::Long, true) => KeyType::ULongInt,
                (IntWidth::LongLong, false) => KeyType::LongLong,
                (IntWidth::LongLong, true) => KeyType::ULongLong,
            },
            FieldKind::Float { .. } => KeyType::Float,
            FieldKind::Double { .. } => KeyType::Double,
            FieldKind::Decimal { .. } => KeyType::Num,
            FieldKind::Temporal { kind, .. } => match kind {
                TemporalKind::NewDate => KeyType::UInt24,
                TemporalKind::Time => KeyType::Int24,
                TemporalKind::DateTime => KeyType::ULongLong,
                TemporalKind::Timestamp => KeyType::ULongInt,
                _ => KeyType::Binary,
            },
            FieldKind::String { charset } => {
                if charset.is_binary() {
                    KeyType::Binary
                } else {
                    KeyType::Text
                }
            }
            FieldKind::Varstring { charset, length_bytes } => match (charset.is_binary(), *length_bytes) {
                (true, 1) => KeyType::VarBinary1,
                (false, 1) => KeyType::VarText1,
                (true, _) => KeyType::VarBinary2,
                (false, _) => KeyType::VarText2,
            },
            FieldKind::Blob { charset, .. } => {
                if charset.is_binary() {
                    KeyType::VarBinary2
                } else {
                    KeyType::VarText2
                }
            }
            FieldKind::Document => KeyType::VarBinary2,
            FieldKind::Bit { .. } => KeyType::Bit,
            FieldKind::Enum { packlength, .. } if *packlength == 2 => KeyType::UShortInt,
            _ => KeyType::Binary,
        }
    }

    /// Fractional digits: scale for numbers, fsp for temporals.
    pub fn decimals(&self) -> u8 {
        match &self.kind {
            FieldKind::Float { dec, .. }
            | FieldKind::Double { dec, .. }
            | FieldKind::Decimal { dec, .. }
            | FieldKind::NewDecimal { dec, .. }
            | FieldKind::Temporal { dec, .. } => *dec,
            _ => 0,
        }
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags & flags::UNSIGNED != 0
    }

    /// Character set of string-like fields; numbers and temporals are binary.
    pub fn charset(&self) -> &'static CharsetInfo {
        match &self.kind {
            FieldKind::String { charset }
            | FieldKind::Varstring { charset, .. }
            | FieldKind::Blob { charset, .. }
            | FieldKind::Enum { charset, .. }
            | FieldKind::Set { charset, .. } => charset,
            _ => &charset::BINARY,
        }
    }

    /// Characters a string field can hold.
    pub fn char_length(&self) -> usize {
        self.field_length as usize / self.charset().mbmaxlen.max(1) as usize
    }

    /// Column type as it would appear in DDL.
    pub fn sql_type(&self) -> String {
        let sign = |unsigned: bool, zerofill: bool| {
            let mut s = String::new();
            if unsigned {
                s.push_str(" unsigned");
            }
            if zerofill {
                s.push_str(" zerofill");
            }
            s
        };
        let with_fsp = |name: &str, dec: u8| {
            if dec > 0 {
                format!("{}({})", name, dec)
            } else {
                name.to_string()
            }
        };
        let quoted = |values: &[String]| {
            values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",")
        };
        match &self.kind {
            FieldKind::Int { width, unsigned, zerofill } => {
                format!("{}({}){}", width.name(), self.field_length, sign(*unsigned, *zerofill))
            }
            FieldKind::Float { dec, unsigned } | FieldKind::Double { dec, unsigned } => {
                let name = if matches!(self.kind, FieldKind::Float { .. }) {
                    "float"
                } else {
                    "double"
                };
                if *dec < NOT_FIXED_DEC {
                    format!("{}({},{}){}", name, self.field_length, dec, sign(*unsigned, false))
                } else {
                    format!("{}{}", name, sign(*unsigned, false))
                }
            }
            FieldKind::Decimal { dec, unsigned, zerofill } => {
                let precision = self.field_length - (*dec > 0) as u32 - (!*unsigned) as u32;
                format!("decimal({},{}){}", precision, dec, sign(*unsigned, *zerofill))
            }
            FieldKind::NewDecimal { precision, dec, unsigned } => {
                format!("decimal({},{}){}", precision, dec, sign(*unsigned, false))
            }
            FieldKind::Year => "year(4)".to_string(),
            FieldKind::Temporal { kind, dec } => match kind {
                TemporalKind::NewDate => "date".to_string(),
                TemporalKind::Time | TemporalKind::Time2 => with_fsp("time", *dec),
                TemporalKind::DateTime | TemporalKind::DateTime2 => with_fsp("datetime", *dec),
                TemporalKind::Timestamp | TemporalKind::Timestamp2 => with_fsp("timestamp", *dec),
            },
            FieldKind::Null => "null".to_string(),
            FieldKind::String { charset } => {
                let name = if charset.is_binary() { "binary" } else { "char" };
                format!("{}({})", name, self.char_length())
            }
            FieldKind::Varstring { charset, .. } => {
                let name = if charset.is_binary() { "varbinary" } else { "varchar" };
                format!("{}({})", name, self.char_length())
            }
            FieldKind::Blob { geometry: true, .. } => "geometry".to_string(),
            FieldKind::Blob { charset, packlength, .. } => {
                let prefix = match packlength {
                    1 => "tiny",
                    2 => "",
                    3 => "medium",
                    _ => "long",
                };
                let base = if charset.is_binary() { "blob" } else { "text" };
                format!("{}{}", prefix, base)
            }
            FieldKind::Enum { values, .. } => format!("enum({})", quoted(values)),
            FieldKind::Set { values, .. } => format!("set({})", quoted(values)),
            FieldKind::Bit { .. } => format!("bit({})", self.field_length),
            FieldKind::Document => "document".to_string(),
        }
    }

    // ---------------------------------------------------------------------
    // Sizes

    /// In-memory footprint of the value.
    pub fn pack_length(&self) -> usize {
        match &self.kind {
            FieldKind::Int { width, .. } => width.bytes(),
            FieldKind::Float { .. } => 4,
            FieldKind::Double { .. } => 8,
            FieldKind::Decimal { .. } | FieldKind::String { .. } => self.field_length as usize,
            FieldKind::NewDecimal { precision, dec, .. } => decimal::bin_size(*precision, *dec),
            FieldKind::Year => 1,
            FieldKind::Temporal { kind, dec } => match kind {
                TemporalKind::NewDate | TemporalKind::Time => 3,
                TemporalKind::Timestamp => 4,
                TemporalKind::DateTime => 8,
                TemporalKind::Time2 => time::time_binary_length(*dec),
                TemporalKind::DateTime2 => time::datetime_binary_length(*dec),
                TemporalKind::Timestamp2 => time::timestamp_binary_length(*dec),
            },
            FieldKind::Null => 0,
            FieldKind::Varstring { length_bytes, .. } => *length_bytes as usize + self.field_length as usize,
            FieldKind::Blob { packlength, .. } => *packlength as usize + BLOB_HANDLE_BYTES,
            FieldKind::Document => blob_pack_length(FieldType::Document) + BLOB_HANDLE_BYTES,
            FieldKind::Enum { packlength, .. } | FieldKind::Set { packlength, .. } => *packlength as usize,
            FieldKind::Bit { .. } => (self.field_length as usize + 7) / 8,
        }
    }

    /// Footprint inside a stored row; omits the out-of-line handle of blobs
    /// and the bits a BIT column keeps in the null bitmap.
    pub fn pack_length_in_rec(&self) -> usize {
        match &self.kind {
            FieldKind::Blob { packlength, .. } => *packlength as usize,
            FieldKind::Document => blob_pack_length(FieldType::Document),
            FieldKind::Bit { bytes_in_rec, .. } => *bytes_in_rec,
            _ => self.pack_length(),
        }
    }

    /// Bytes this field occupies at `ptr` in a record buffer.
    pub(crate) fn rec_length(&self) -> usize {
        match &self.kind {
            FieldKind::Bit { bytes_in_rec, .. } => *bytes_in_rec,
            _ => self.pack_length(),
        }
    }

    /// Footprint on the replication wire, excluding length prefixes.
    pub fn row_pack_length(&self) -> usize {
        match &self.kind {
            FieldKind::Varstring { .. } => self.field_length as usize,
            FieldKind::Blob { .. } | FieldKind::Document => self.pack_length_in_rec(),
            _ => self.pack_length(),
        }
    }

    /// Largest payload the field can hold.
    pub fn max_data_length(&self) -> usize {
        match &self.kind {
            FieldKind::Varstring { .. } => self.field_length as usize,
            FieldKind::Blob { .. } | FieldKind::Document => {
                let bits = 8 * self.pack_length_in_rec() as u32;
                ((1u64 << bits) - 1) as usize
            }
            _ => self.pack_length(),
        }
    }

    /// Length of the stored value: the prefix for variable-length fields.
    pub fn data_length(&self, row: &RowBuffer) -> usize {
        match &self.kind {
            FieldKind::Varstring { .. } | FieldKind::Blob { .. } | FieldKind::Document => {
                string::stored_length(self, self.image(row))
            }
            _ => self.pack_length(),
        }
    }

    /// Bytes used by a key part on this field.
    pub fn key_length(&self) -> usize {
        match &self.kind {
            FieldKind::Varstring { .. } => self.field_length as usize,
            FieldKind::Blob { .. } | FieldKind::Document => 0,
            _ => self.pack_length(),
        }
    }

    /// Length of the sort key produced by [`Field::make_sort_key`].
    pub fn sort_length(&self, config: &FieldConfig) -> usize {
        match &self.kind {
            FieldKind::Varstring { charset, length_bytes } => {
                self.field_length as usize + if charset.is_binary() { *length_bytes as usize } else { 0 }
            }
            FieldKind::Blob { charset, .. } => {
                let data = config.max_sort_length.min(self.max_data_length());
                data + if charset.is_binary() { self.pack_length_in_rec() } else { 0 }
            }
            FieldKind::Document => config.max_sort_length.min(self.max_data_length()) + self.pack_length_in_rec(),
            FieldKind::Bit { .. } => self.pack_length(),
            _ => self.pack_length(),
        }
    }

    // ---------------------------------------------------------------------
    // Binding and nullability

    /// Bind to a new position and null bit.
    pub fn move_field(&mut self, ptr: usize, null: Option<NullBit>) {
        self.ptr = ptr;
        self.null = null;
    }

    /// Shift the binding by `diff` bytes, e.g. onto record[1] or the default
    /// values record.
    pub fn move_field_offset(&mut self, diff: isize) {
        self.ptr = offset_add(self.ptr, diff);
        self.null = self.null.map(|nb| nb.shifted(diff));
        if let FieldKind::Bit { bits: Some(range), .. } = &mut self.kind {
            *range = range.shifted(diff);
        }
    }

    pub fn maybe_null(&self) -> bool {
        self.null.is_some()
    }

    pub fn real_maybe_null(&self) -> bool {
        self.null.is_some()
    }

    /// True when the value is SQL NULL. Non-nullable fields report the
    /// buffer's NULL-complemented row flag.
    pub fn is_null(&self, row: &RowBuffer) -> bool {
        self.is_null_at(row, 0)
    }

    /// Null test against the record `offset` bytes away.
    pub fn is_null_at(&self, row: &RowBuffer, offset: isize) -> bool {
        if self.kind == FieldKind::Null {
            return true;
        }
        match self.null {
            Some(nb) => row.test_bit(nb.shifted(offset)),
            None => row.null_row(),
        }
    }

    /// Null test that ignores the NULL-complemented row flag.
    pub fn is_real_null(&self, row: &RowBuffer) -> bool {
        match self.null {
            Some(nb) => row.test_bit(nb),
            None => self.kind == FieldKind::Null,
        }
    }

    pub fn set_null(&self, row: &mut RowBuffer) {
        if let Some(nb) = self.null {
            row.set_bit(nb);
        }
    }

    pub fn set_notnull(&self, row: &mut RowBuffer) {
        if let Some(nb) = self.null {
            row.clear_bit(nb);
        }
    }

    pub fn check_field_name_match(&self, table_name: Option<&str>, field_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(field_name) && table_name.map_or(true, |t| t == self.table_name)
    }

    /// True when both fields store values with an identical byte layout.
    pub fn eq_def(&self, other: &Field) -> bool {
        if self.real_type() != other.real_type() || self.pack_length() != other.pack_length() {
            return false;
        }
        match (&self.kind, &other.kind) {
            (FieldKind::Bit { bits: a, bytes_in_rec: ba, .. }, FieldKind::Bit { bits: b, bytes_in_rec: bb, .. }) => {
                a.is_some() == b.is_some() && ba == bb && self.field_length == other.field_length
            }
            (a, b) => a == b && self.field_length == other.field_length,
        }
    }

    // ---------------------------------------------------------------------
    // Warnings

    pub(crate) fn warn(&self, row: &mut RowBuffer, level: WarningLevel, code: WarningCode, message: impl Into<String>) {
        row.session_mut().push_warning(level, code, &self.name, message);
    }

    /// Raise the warning that conventionally accompanies `status`.
    pub(crate) fn warn_status(&self, row: &mut RowBuffer, status: ConversionStatus) {
        let (level, code, message) = match status {
            ConversionStatus::Ok => return,
            ConversionStatus::NoteTimeTruncated => (WarningLevel::Note, WarningCode::DataTruncated, "Time value truncated"),
            ConversionStatus::WarnOutOfRange => (WarningLevel::Warning, WarningCode::DataOutOfRange, "Out of range value"),
            ConversionStatus::NoteTruncated => (WarningLevel::Note, WarningCode::DataTruncated, "Data truncated"),
            ConversionStatus::WarnTruncated => (WarningLevel::Warning, WarningCode::DataTruncated, "Data truncated"),
            ConversionStatus::ErrNullConstraintViolation => {
                (WarningLevel::Error, WarningCode::BadNull, "Column cannot be null")
            }
            ConversionStatus::ErrBadValue => (WarningLevel::Warning, WarningCode::TruncatedWrongValue, "Incorrect value"),
            ConversionStatus::ErrOom => (WarningLevel::Error, WarningCode::DataTruncated, "Out of memory"),
        };
        self.warn(row, level, code, message);
    }

    // ---------------------------------------------------------------------
    // Store

    /// Store text. `cs` describes the source bytes.
    pub fn store_str(&self, row: &mut RowBuffer, s: &[u8], cs: &CharsetInfo) -> ConversionStatus {
        match self.family() {
            Family::Numeric => numeric::store_str(self, row, s),
            Family::Str => string::store_str(self, row, s, cs),
            Family::Temporal => temporal::store_str(self, row, s),
            Family::Bit => bit::store_str(self, row, s),
        }
    }

    pub fn store_f64(&self, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
        match self.family() {
            Family::Numeric => numeric::store_real(self, row, nr),
            Family::Str => string::store_real(self, row, nr),
            Family::Temporal => temporal::store_real(self, row, nr),
            Family::Bit => bit::store_real(self, row, nr),
        }
    }

    pub fn store_int(&self, row: &mut RowBuffer, nr: i64, unsigned: bool) -> ConversionStatus {
        match self.family() {
            Family::Numeric => numeric::store_int(self, row, nr, unsigned),
            Family::Str => string::store_int(self, row, nr, unsigned),
            Family::Temporal => temporal::store_int(self, row, nr, unsigned),
            Family::Bit => bit::store_int(self, row, nr, unsigned),
        }
    }

    pub fn store_decimal(&self, row: &mut RowBuffer, value: &Decimal) -> ConversionStatus {
        self.store_decimal_digits(row, &DecimalDigits::from_decimal(value))
    }

    /// Store an exact decimal of any precision.
    pub fn store_decimal_digits(&self, row: &mut RowBuffer, value: &DecimalDigits) -> ConversionStatus {
        match self.family() {
            Family::Numeric => numeric::store_decimal(self, row, value),
            Family::Str => string::store_decimal(self, row, value),
            Family::Temporal => temporal::store_decimal(self, row, value),
            Family::Bit => bit::store_decimal(self, row, value),
        }
    }

    /// Store a calendar value carrying `dec` meaningful fractional digits.
    pub fn store_time(&self, row: &mut RowBuffer, t: &MysqlTime, dec: u8) -> ConversionStatus {
        match self.family() {
            Family::Temporal => temporal::store_time(self, row, t, dec),
            Family::Str => string::store_time(self, row, t, dec),
            Family::Numeric | Family::Bit => {
                let digits = t.to_decimal_digits();
                if self.result_type() == ItemResult::Int {
                    let (rounded, _) = digits.round_to(0);
                    self.store_decimal_digits(row, &rounded)
                } else {
                    self.store_decimal_digits(row, &digits)
                }
            }
        }
    }

    /// Store a packed temporal integer (see [`time::pack_datetime`]).
    pub fn store_packed(&self, row: &mut RowBuffer, packed: i64) -> ConversionStatus {
        match &self.kind {
            FieldKind::Temporal { kind, .. } if !kind.has_date() => {
                self.store_time(row, &time::unpack_time(packed), 6)
            }
            FieldKind::Temporal { kind, .. } => {
                let t = time::unpack_datetime(packed, kind.time_type());
                self.store_time(row, &t, 6)
            }
            _ => self.store_int(row, packed, false),
        }
    }

    /// Store a point in time into a TIMESTAMP column without time zone
    /// conversion. Other types receive the session-local DATETIME.
    pub fn store_timestamp(&self, row: &mut RowBuffer, tv: Timeval) -> ConversionStatus {
        match &self.kind {
            FieldKind::Temporal { kind, .. } if kind.is_timestamp() => temporal::store_timeval(self, row, tv),
            _ => {
                let t = row.config().time_zone.epoch_to_local(tv);
                self.store_time(row, &t, 6)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Read

    pub fn val_int(&self, row: &RowBuffer) -> i64 {
        let r = self.image(row);
        match self.family() {
            Family::Numeric => numeric::val_int(self, r),
            Family::Str => string::val_int(self, r),
            Family::Temporal => temporal::val_int(self, r),
            Family::Bit => bit::val_int(self, r),
        }
    }

    pub fn val_real(&self, row: &RowBuffer) -> f64 {
        let r = self.image(row);
        match self.family() {
            Family::Numeric => numeric::val_real(self, r),
            Family::Str => string::val_real(self, r),
            Family::Temporal => temporal::val_real(self, r),
            Family::Bit => bit::val_int(self, r) as u64 as f64,
        }
    }

    /// Exact value of the field as digits.
    pub fn val_decimal_digits(&self, row: &RowBuffer) -> DecimalDigits {
        let r = self.image(row);
        match self.family() {
            Family::Numeric => numeric::val_decimal(self, r),
            Family::Str => string::val_decimal(self, r),
            Family::Temporal => temporal::val_decimal(self, r),
            Family::Bit => DecimalDigits::from_u64(bit::val_int(self, r) as u64),
        }
    }

    /// Value as a `Decimal`, saturating beyond 28 significant digits.
    pub fn val_decimal(&self, row: &RowBuffer) -> Decimal {
        self.val_decimal_digits(row).to_decimal()
    }

    /// Text form of the value. Borrowed from the row where possible.
    pub fn val_str<'a>(&self, row: &'a RowBuffer) -> Cow<'a, [u8]> {
        let r = self.image(row);
        match self.family() {
            Family::Numeric => numeric::val_str(self, r),
            Family::Str => string::val_str(self, r),
            Family::Temporal => temporal::val_str(self, r),
            Family::Bit => bit::val_str(self, r),
        }
    }

    /// Lossy UTF-8 view of [`Field::val_str`].
    pub fn val_string(&self, row: &RowBuffer) -> String {
        String::from_utf8_lossy(&self.val_str(row)).into_owned()
    }

    /// Value as a DATE/DATETIME. TIME values are placed on the session's
    /// current date; non-temporal values are parsed.
    pub fn get_date(&self, row: &RowBuffer) -> Option<MysqlTime> {
        match self.family() {
            Family::Temporal => temporal::get_date(self, row),
            _ => {
                let text = self.val_str(row);
                let flags = row.config().sql_mode.date_flags();
                time::str_to_datetime(&text, flags).ok().map(|(t, _)| t)
            }
        }
    }

    /// Value as a TIME.
    pub fn get_time(&self, row: &RowBuffer) -> Option<MysqlTime> {
        match self.family() {
            Family::Temporal => temporal::get_time(self, row),
            _ => {
                let text = self.val_str(row);
                time::str_to_time(&text).ok().map(|(t, _)| match t.time_type {
                    TimeType::Time => t,
                    _ => t.to_time_part(),
                })
            }
        }
    }

    /// Packed DATETIME form of the value, 0 when it has none.
    pub fn val_date_temporal(&self, row: &RowBuffer) -> i64 {
        self.get_date(row).map(|t| time::pack_datetime(&t)).unwrap_or(0)
    }

    /// Packed TIME form of the value, 0 when it has none.
    pub fn val_time_temporal(&self, row: &RowBuffer) -> i64 {
        self.get_time(row).map(|t| time::pack_time(&t)).unwrap_or(0)
    }

    /// Seconds since the epoch of a TIMESTAMP column; `None` for NULL or
    /// other types.
    pub fn get_timestamp(&self, row: &RowBuffer) -> Option<Timeval> {
        if self.is_null(row) {
            return None;
        }
        match &self.kind {
            FieldKind::Temporal { kind, .. } if kind.is_timestamp() => Some(temporal::read_timeval(self, self.image(row))),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Compare and sort

    /// Compare this field's value in `a` with its value in `b`.
    pub fn cmp(&self, a: &RowBuffer, b: &RowBuffer) -> Ordering {
        self.cmp_refs(self.image(a), self.image(b))
    }

    /// Compare this record with the record `row_offset` bytes further on.
    pub fn cmp_offset(&self, row: &RowBuffer, row_offset: usize) -> Ordering {
        self.cmp_refs(
            self.image(row),
            RecordRef {
                row,
                ptr: self.ptr + row_offset,
            },
        )
    }

    pub(crate) fn cmp_refs(&self, a: RecordRef<'_>, b: RecordRef<'_>) -> Ordering {
        match self.family() {
            Family::Numeric => numeric::cmp(self, a, b),
            Family::Str => string::cmp(self, a, b),
            Family::Temporal => temporal::cmp(self, a, b),
            Family::Bit => bit::cmp(self, a, b),
        }
    }

    /// Write a memcmp-comparable key of `to.len()` bytes.
    pub fn make_sort_key(&self, row: &RowBuffer, to: &mut [u8]) {
        let r = self.image(row);
        match self.family() {
            Family::Numeric => numeric::make_sort_key(self, r, to),
            Family::Str => string::make_sort_key(self, r, to),
            Family::Temporal => temporal::make_sort_key(self, r, to),
            Family::Bit => bit::make_sort_key(self, r, to),
        }
    }

    // ---------------------------------------------------------------------
    // Replication wire format

    /// Append the wire image of the value to `to`.
    pub fn pack(&self, row: &RowBuffer, to: &mut Vec<u8>, max_length: usize, low_byte_first: bool) {
        let r = self.image(row);
        match self.family() {
            Family::Str => string::pack(self, r, to, max_length, low_byte_first),
            Family::Bit => bit::pack(self, r, to),
            Family::Numeric | Family::Temporal => self.pack_fixed(r, to, low_byte_first),
        }
    }

    /// Read a wire image written by a source column described by
    /// `param_data` (0 means "same definition as this field").
    ///
    /// Returns the number of bytes consumed.
    pub fn unpack(&self, row: &mut RowBuffer, from: &[u8], param_data: u32, low_byte_first: bool) -> Result<usize, FieldError> {
        match self.family() {
            Family::Str => string::unpack(self, row, from, param_data, low_byte_first),
            Family::Bit => bit::unpack(self, row, from, param_data),
            Family::Numeric => numeric::unpack(self, row, from, param_data, low_byte_first),
            Family::Temporal => self.unpack_fixed(row, from, low_byte_first),
        }
    }

    /// True when the record image is an integer in record byte order.
    fn is_integer_image(&self) -> bool {
        match &self.kind {
            FieldKind::Int { .. } | FieldKind::Float { .. } | FieldKind::Double { .. } => true,
            FieldKind::Temporal { kind, .. } => !kind.is_fractional(),
            _ => false,
        }
    }

    pub(crate) fn pack_fixed(&self, r: RecordRef<'_>, to: &mut Vec<u8>, low_byte_first: bool) {
        let len = self.pack_length();
        let src = r.bytes(len);
        let start = to.len();
        to.resize(start + len, 0);
        if self.is_integer_image() {
            codec::handle_int(&mut to[start..], src, len, r.low_byte_first(), low_byte_first);
        } else {
            to[start..].copy_from_slice(src);
        }
    }

    pub(crate) fn unpack_fixed(&self, row: &mut RowBuffer, from: &[u8], low_byte_first: bool) -> Result<usize, FieldError> {
        let len = self.pack_length();
        need(from, len, &self.name)?;
        let row_lbf = row.low_byte_first();
        let integer = self.is_integer_image();
        let dst = row.slice_mut(self.ptr, len);
        if integer {
            codec::handle_int(dst, from, len, low_byte_first, row_lbf);
        } else {
            dst.copy_from_slice(&from[..len]);
        }
        Ok(len)
    }

    /// Append the table-map metadata of this column; returns bytes written.
    pub fn save_field_metadata(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        match &self.kind {
            FieldKind::Float { .. } | FieldKind::Double { .. } => out.push(self.pack_length() as u8),
            FieldKind::NewDecimal { precision, dec, .. } => out.extend_from_slice(&[*precision, *dec]),
            FieldKind::Temporal { kind, dec } if kind.is_fractional() => out.push(*dec),
            FieldKind::String { .. } => {
                let len = self.field_length;
                out.push(self.real_type().code() ^ ((len & 0x300) >> 4) as u8);
                out.push((len & 0xFF) as u8);
            }
            FieldKind::Varstring { .. } => out.extend_from_slice(&(self.field_length as u16).to_le_bytes()),
            FieldKind::Blob { packlength, .. } => out.push(*packlength),
            FieldKind::Document => out.push(self.pack_length_in_rec() as u8),
            FieldKind::Enum { packlength, .. } | FieldKind::Set { packlength, .. } => {
                out.extend_from_slice(&[self.real_type().code(), *packlength])
            }
            FieldKind::Bit { .. } => {
                out.push((self.field_length % 8) as u8);
                out.push((self.field_length / 8) as u8);
            }
            _ => {}
        }
        out.len() - start
    }

    /// Metadata word this field's own definition would produce.
    pub fn own_param_data(&self) -> u32 {
        let mut meta = Vec::new();
        self.save_field_metadata(&mut meta);
        crate::field::types::metadata_to_param(self.binlog_type(), &meta)
            .map(|(p, _)| p)
            .unwrap_or(0)
    }

    /// In-memory size of a value written by a source column with `metadata`.
    pub fn pack_length_from_metadata(&self, metadata: u32) -> usize {
        match &self.kind {
            FieldKind::Float { .. } | FieldKind::Double { .. } => metadata as usize,
            FieldKind::NewDecimal { .. } => decimal::bin_size((metadata >> 8) as u8, (metadata & 0xFF) as u8),
            FieldKind::Temporal { kind, .. } if kind.is_fractional() => match kind {
                TemporalKind::Time2 => time::time_binary_length(metadata as u8),
                TemporalKind::DateTime2 => time::datetime_binary_length(metadata as u8),
                _ => time::timestamp_binary_length(metadata as u8),
            },
            FieldKind::String { .. } => string::char_from_length(metadata),
            FieldKind::Varstring { .. } => metadata as usize,
            FieldKind::Blob { .. } | FieldKind::Document => (metadata & 0xFF) as usize + BLOB_HANDLE_BYTES,
            FieldKind::Enum { .. } | FieldKind::Set { .. } => (metadata & 0xFF) as usize,
            FieldKind::Bit { .. } => ((metadata >> 8) + ((metadata & 0xFF) > 0) as u32) as usize,
            _ => self.row_pack_length(),
        }
    }

    /// Compare a source column's size (from its metadata) with this one.
    ///
    /// `None` means the source cannot be unpacked directly into this field;
    /// otherwise the ordering tells whether the source is smaller, equal or
    /// larger.
    pub fn compatible_field_size(&self, metadata: u32) -> Option<Ordering> {
        match &self.kind {
            FieldKind::NewDecimal { precision, dec, .. } => {
                let sp = (metadata >> 8) as u8;
                let sd = (metadata & 0xFF) as u8;
                let by_precision = sp.cmp(precision);
                let by_scale = sd.cmp(dec);
                match (by_precision, by_scale) {
                    (p, Ordering::Equal) => Some(p),
                    (Ordering::Equal, s) => Some(s),
                    (p, s) if p == s => Some(p),
                    _ => None,
                }
            }
            FieldKind::Temporal { dec, kind } if kind.is_fractional() => Some((metadata as u8).cmp(dec)),
            FieldKind::String { .. } => Some(string::char_from_length(metadata).cmp(&(self.field_length as usize))),
            FieldKind::Varstring { .. } => Some((metadata as usize).cmp(&(self.field_length as usize))),
            FieldKind::Blob { packlength, .. } => Some(((metadata & 0xFF) as u8).cmp(packlength)),
            FieldKind::Enum { packlength, .. } | FieldKind::Set { packlength, .. } => {
                let source_real = (metadata >> 8) as u8;
                if source_real != self.real_type().code() {
                    return None;
                }
                Some(((metadata & 0xFF) as u8).cmp(packlength))
            }
            FieldKind::Bit { .. } => {
                let source_bits = (metadata >> 8) * 8 + (metadata & 0xFF);
                Some(source_bits.cmp(&self.field_length))
            }
            _ => Some(self.pack_length_from_metadata(metadata).cmp(&self.row_pack_length())),
        }
    }

    // ---------------------------------------------------------------------
    // Keys

    /// Append the index key image of the value; returns bytes appended.
    ///
    /// Variable-length values are written as a 2-byte little-endian length
    /// followed by the data zero-padded to `length`.
    pub fn get_key_image(&self, row: &RowBuffer, buf: &mut Vec<u8>, length: usize) -> usize {
        let start = buf.len();
        match &self.kind {
            FieldKind::Varstring { .. } | FieldKind::Blob { .. } | FieldKind::Document => {
                let data = self.val_str(row);
                let n = data.len().min(length);
                buf.extend_from_slice(&(n as u16).to_le_bytes());
                buf.extend_from_slice(&data[..n]);
                buf.resize(start + KEY_BLOB_LENGTH + length, 0);
            }
            FieldKind::Bit { .. } => {
                let mut key = vec![0u8; self.pack_length()];
                bit::make_sort_key(self, self.image(row), &mut key);
                let n = key.len().min(length);
                buf.extend_from_slice(&key[..n]);
            }
            _ => {
                let n = self.rec_length().min(length);
                buf.extend_from_slice(row.slice(self.ptr, n));
            }
        }
        buf.len() - start
    }

    /// Restore a value from a key image produced by [`Field::get_key_image`].
    pub fn set_key_image(&self, row: &mut RowBuffer, key: &[u8]) -> ConversionStatus {
        match &self.kind {
            FieldKind::Varstring { .. } | FieldKind::Blob { .. } | FieldKind::Document => {
                if key.len() < KEY_BLOB_LENGTH {
                    return self.reset(row);
                }
                let len = (u16::from_le_bytes([key[0], key[1]]) as usize).min(key.len() - KEY_BLOB_LENGTH);
                let data = key[KEY_BLOB_LENGTH..KEY_BLOB_LENGTH + len].to_vec();
                self.store_str(row, &data, self.charset())
            }
            FieldKind::Bit { .. } => bit::store_str(self, row, key),
            _ => {
                let n = self.rec_length().min(key.len());
                row.slice_mut(self.ptr, n).copy_from_slice(&key[..n]);
                ConversionStatus::Ok
            }
        }
    }

    // ---------------------------------------------------------------------
    // Reset and defaults

    /// Store the type's canonical empty value.
    ///
    /// A non-nullable GEOMETRY column has no such value and reports
    /// `ErrNullConstraintViolation`.
    pub fn reset(&self, row: &mut RowBuffer) -> ConversionStatus {
        match self.family() {
            Family::Numeric => numeric::reset(self, row),
            Family::Str => string::reset(self, row),
            Family::Temporal => temporal::reset(self, row),
            Family::Bit => bit::reset(self, row),
        }
    }

    /// Load the column default: evaluate CURRENT_TIMESTAMP or copy the value
    /// from the default-values record `default_offset` bytes away.
    pub fn set_default(&self, row: &mut RowBuffer, default_offset: isize) {
        if self.auto_init.has_insert_default_function() {
            self.set_notnull(row);
            self.store_current_time(row);
            return;
        }
        let src = offset_add(self.ptr, default_offset);
        let replaced = string::blob_handle_at(self, row, self.ptr);
        row.copy_within(src, self.ptr, self.rec_length());
        if let Some(old) = replaced {
            if let Some(new) = string::blob_handle_at(self, row, self.ptr) {
                row.retain_blob(new);
            }
            row.release_blob(old);
        }
        if let FieldKind::Bit { bits: Some(range), .. } = &self.kind {
            let bits = row.get_rec_bits(range.shifted(default_offset));
            row.set_rec_bits(*range, bits);
        }
        if let Some(nb) = self.null {
            if row.test_bit(nb.shifted(default_offset)) {
                row.set_bit(nb);
            } else {
                row.clear_bit(nb);
            }
        }
    }

    /// Apply ON UPDATE CURRENT_TIMESTAMP, if the column has it.
    pub fn evaluate_update_default_function(&self, row: &mut RowBuffer) -> bool {
        if !self.auto_init.has_update_default_function() {
            return false;
        }
        self.set_notnull(row);
        self.store_current_time(row);
        true
    }

    pub(crate) fn store_current_time(&self, row: &mut RowBuffer) -> ConversionStatus {
        let now = row.session().now();
        self.store_timestamp(row, now)
    }
}

/// Fail with a parse error unless `from` holds at least `len` bytes.
pub(crate) fn need(from: &[u8], len: usize, name: &str) -> Result<(), FieldError> {
    if from.len() < len {
        return Err(FieldError::Parse(format!(
            "truncated row image for column '{}': need {} bytes, have {}",
            name,
            len,
            from.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::charset::LATIN1_SWEDISH_CI;

    fn int_field(width: IntWidth, unsigned: bool) -> Field {
        Field::new("c", FieldKind::Int { width, unsigned, zerofill: false }, width.display_length(unsigned))
    }

    #[test]
    fn test_int_ranges() {
        assert_eq!(IntWidth::Tiny.range(false), (-128, 127));
        assert_eq!(IntWidth::Medium.range(true), (0, 16_777_215));
        assert_eq!(IntWidth::LongLong.range(true).1, u64::MAX as i128);
    }

    #[test]
    fn test_type_codes() {
        let f = Field::new("d", FieldKind::Temporal { kind: TemporalKind::DateTime2, dec: 3 }, 23);
        assert_eq!(f.field_type(), FieldType::DateTime);
        assert_eq!(f.real_type(), FieldType::DateTime2);
        assert_eq!(f.binlog_type(), FieldType::DateTime2);
        let e = Field::new(
            "e",
            FieldKind::Enum {
                charset: &LATIN1_SWEDISH_CI,
                packlength: 1,
                values: vec!["a".into()],
            },
            1,
        );
        assert_eq!(e.field_type(), FieldType::String);
        assert_eq!(e.real_type(), FieldType::Enum);
        assert_eq!(e.sql_type(), "enum('a')");
    }

    #[test]
    fn test_sizes() {
        let v = Field::new(
            "v",
            FieldKind::Varstring {
                charset: &LATIN1_SWEDISH_CI,
                length_bytes: 2,
            },
            300,
        );
        assert_eq!(v.pack_length(), 302);
        assert_eq!(v.row_pack_length(), 300);
        assert_eq!(v.max_data_length(), 300);
        let b = Field::new(
            "b",
            FieldKind::Blob {
                charset: &charset::BINARY,
                packlength: 2,
                geometry: false,
            },
            65_535,
        );
        assert_eq!(b.pack_length(), 10);
        assert_eq!(b.pack_length_in_rec(), 2);
        assert_eq!(b.max_data_length(), 65_535);
        assert_eq!(b.sql_type(), "blob");
        let bit = Field::new(
            "bit",
            FieldKind::Bit {
                bytes_in_rec: 1,
                bit_len: 2,
                bits: Some(BitRange { offset: 0, shift: 1, len: 2 }),
            },
            10,
        );
        assert_eq!(bit.pack_length(), 2);
        assert_eq!(bit.pack_length_in_rec(), 1);
    }

    #[test]
    fn test_null_uses_only_own_bit() {
        let a = int_field(IntWidth::Long, false).with_null(NullBit::new(0, 0x01)).at(1);
        let b = int_field(IntWidth::Long, false).with_null(NullBit::new(0, 0x02)).at(5);
        let mut row = RowBuffer::new(9);
        a.set_null(&mut row);
        assert!(a.is_null(&row));
        assert!(!b.is_null(&row));
        b.set_null(&mut row);
        a.set_notnull(&mut row);
        assert!(!a.is_null(&row));
        assert!(b.is_null(&row));
    }

    #[test]
    fn test_not_nullable_follows_null_row() {
        let f = int_field(IntWidth::Tiny, false);
        let mut row = RowBuffer::new(1);
        assert!(!f.is_null(&row));
        row.set_null_row(true);
        assert!(f.is_null(&row));
        assert!(!f.is_real_null(&row));
    }

    #[test]
    fn test_move_field_offset_and_clone() {
        let mut f = int_field(IntWidth::Short, false).with_null(NullBit::new(0, 4)).at(1);
        let copy = f.clone();
        f.move_field_offset(10);
        assert_eq!(f.ptr, 11);
        assert_eq!(f.null, Some(NullBit::new(10, 4)));
        assert_eq!(copy.ptr, 1);
    }

    #[test]
    fn test_metadata_bytes() {
        let d = Field::new(
            "d",
            FieldKind::NewDecimal {
                precision: 10,
                dec: 2,
                unsigned: false,
            },
            12,
        );
        let mut out = Vec::new();
        assert_eq!(d.save_field_metadata(&mut out), 2);
        assert_eq!(out, vec![10, 2]);
        assert_eq!(d.own_param_data(), (10 << 8) | 2);
        assert_eq!(d.compatible_field_size((12 << 8) | 2), Some(Ordering::Greater));
        assert_eq!(d.compatible_field_size((12 << 8) | 1), None);

        let c = Field::new("c", FieldKind::String { charset: &LATIN1_SWEDISH_CI }, 600);
        out.clear();
        c.save_field_metadata(&mut out);
        assert_eq!(out, vec![0xfe ^ 0x20, 0x58]);
        assert_eq!(c.pack_length_from_metadata(c.own_param_data()), 600);
    }

    #[test]
    fn test_name_match() {
        let mut f = int_field(IntWidth::Long, false);
        f.name = "Id".into();
        f.table_name = "t1".into();
        assert!(f.check_field_name_match(None, "id"));
        assert!(f.check_field_name_match(Some("t1"), "ID"));
        assert!(!f.check_field_name_match(Some("t2"), "id"));
    }
}
