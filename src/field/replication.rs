//! Row images for row-based replication.
//!
//! A [`TableMap`] describes the source table: one type code and a few bytes
//! of metadata per column, plus which columns are nullable. A row image is a
//! null bitmap (one bit per column, set when the column is NULL) followed by
//! the [`Field::pack`] image of every non-NULL column, little-endian.
//!
//! On the receiving side a column whose source definition matches the
//! target is unpacked in place. Anything else goes through a conversion
//! field built from the source type and metadata, then [`field_conv`].
//!
//! ```
//! use rowfield::field::replication::{pack_row, unpack_row, TableMap};
//! use rowfield::field::schema::{ColumnDef, TableSchema};
//! use rowfield::field::session::FieldConfig;
//!
//! let source = TableSchema::new("t", vec![ColumnDef::new("a", "int")])
//!     .open(FieldConfig::default())
//!     .unwrap();
//! let mut target = TableSchema::new("t", vec![ColumnDef::new("a", "bigint")])
//!     .open(FieldConfig::default())
//!     .unwrap();
//!
//! let mut src_row = source.row.clone();
//! source.fields[0].set_notnull(&mut src_row);
//! source.fields[0].store_int(&mut src_row, -5, false);
//!
//! let map = TableMap::from_fields(&source.name, &source.fields);
//! let image = pack_row(&source.fields, &src_row);
//! let out = unpack_row(&map, &target.fields, &mut target.row, &image).unwrap();
//! assert_eq!(out.used, image.len());
//! assert_eq!(target.fields[0].val_int(&target.row), -5);
//! ```

use std::cmp::Ordering;
use std::convert::TryFrom;

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::field::base::{Field, FieldKind, IntWidth, TemporalKind};
use crate::field::charset::{self, CharsetInfo};
use crate::field::copy::{field_conv, set_field_to_null};
use crate::field::decimal;
use crate::field::row::RowBuffer;
use crate::field::schema::TableDef;
use crate::field::status::ConversionStatus;
use crate::field::string::char_from_length;
use crate::field::types::{metadata_to_param, FieldType, ItemResult, NOT_FIXED_DEC};
use crate::FieldError;

/// Source description of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub field_type: FieldType,
    pub metadata: Vec<u8>,
    pub nullable: bool,
}

impl ColumnMap {
    pub fn of(field: &Field) -> ColumnMap {
        let mut metadata = Vec::new();
        field.save_field_metadata(&mut metadata);
        ColumnMap {
            field_type: field.binlog_type(),
            metadata,
            nullable: field.real_maybe_null(),
        }
    }

    /// The metadata as the word [`Field::unpack`] takes.
    pub fn param(&self) -> Result<u32, FieldError> {
        metadata_to_param(self.field_type, &self.metadata).map(|(p, _)| p)
    }
}

/// Column types and metadata of a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMap {
    pub table_name: String,
    pub columns: Vec<ColumnMap>,
}

fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize, what: &str) -> Result<&'a [u8], FieldError> {
    if data.len() < *pos + len {
        return Err(FieldError::Parse(format!(
            "table map truncated in {}: need {} bytes at offset {}, have {}",
            what,
            len,
            *pos,
            data.len()
        )));
    }
    let out = &data[*pos..*pos + len];
    *pos += len;
    Ok(out)
}

impl TableMap {
    pub fn from_fields(table_name: &str, fields: &[Field]) -> TableMap {
        TableMap {
            table_name: table_name.to_string(),
            columns: fields.iter().map(ColumnMap::of).collect(),
        }
    }

    pub fn from_table(table: &TableDef) -> TableMap {
        Self::from_fields(&table.name, &table.fields)
    }

    /// Serialize as: name length (1 byte), name, column count (u16), type
    /// codes, metadata length (u16), metadata, nullable bitmap.
    pub fn encode(&self) -> Vec<u8> {
        let name = self.table_name.as_bytes();
        let name = &name[..name.len().min(255)];
        let mut out = vec![name.len() as u8];
        out.extend_from_slice(name);

        let mut word = [0u8; 2];
        LittleEndian::write_u16(&mut word, self.columns.len() as u16);
        out.extend_from_slice(&word);
        out.extend(self.columns.iter().map(|c| c.field_type.code()));

        let metadata: Vec<u8> = self.columns.iter().flat_map(|c| c.metadata.iter().copied()).collect();
        LittleEndian::write_u16(&mut word, metadata.len() as u16);
        out.extend_from_slice(&word);
        out.extend_from_slice(&metadata);

        let mut nullable = vec![0u8; (self.columns.len() + 7) / 8];
        for (i, c) in self.columns.iter().enumerate() {
            if c.nullable {
                nullable[i / 8] |= 1 << (i % 8);
            }
        }
        out.extend_from_slice(&nullable);
        out
    }

    pub fn decode(data: &[u8]) -> Result<TableMap, FieldError> {
        let mut pos = 0;
        let name_len = take(data, &mut pos, 1, "name length")?[0] as usize;
        let table_name = String::from_utf8_lossy(take(data, &mut pos, name_len, "name")?).into_owned();
        let count = LittleEndian::read_u16(take(data, &mut pos, 2, "column count")?) as usize;
        let types = take(data, &mut pos, count, "column types")?
            .iter()
            .map(|&code| FieldType::try_from(code))
            .collect::<Result<Vec<_>, _>>()?;
        let meta_len = LittleEndian::read_u16(take(data, &mut pos, 2, "metadata length")?) as usize;
        let metadata = take(data, &mut pos, meta_len, "metadata")?;
        let nullable = take(data, &mut pos, (count + 7) / 8, "null bitmap")?;

        let mut columns = Vec::with_capacity(count);
        let mut mpos = 0;
        for (i, ft) in types.into_iter().enumerate() {
            let n = ft.metadata_len();
            let meta = take(metadata, &mut mpos, n, "column metadata")?;
            columns.push(ColumnMap {
                field_type: ft,
                metadata: meta.to_vec(),
                nullable: nullable[i / 8] & (1 << (i % 8)) != 0,
            });
        }
        if mpos != meta_len {
            return Err(FieldError::Parse(format!(
                "table map metadata has {} unused bytes",
                meta_len - mpos
            )));
        }
        Ok(TableMap { table_name, columns })
    }
}

/// Write the row image of `fields` as bound in `row`.
pub fn pack_row(fields: &[Field], row: &RowBuffer) -> Vec<u8> {
    let mut out = vec![0u8; (fields.len() + 7) / 8];
    for (i, f) in fields.iter().enumerate() {
        if f.is_null(row) {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    for f in fields.iter().filter(|f| !f.is_null(row)) {
        f.pack(row, &mut out, usize::MAX, true);
    }
    out
}

/// Outcome of [`unpack_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackedRow {
    /// Worst conversion status over all columns.
    pub status: ConversionStatus,
    /// Bytes of the image consumed.
    pub used: usize,
}

/// Real type of a CHAR-class column from its metadata word.
fn string_real_type(param: u32) -> Result<FieldType, FieldError> {
    let code = (param >> 8) as u8;
    if code & 0x30 != 0x30 {
        return Ok(FieldType::String);
    }
    FieldType::try_from(code)
}

fn can_unpack_directly(target: &Field, column: &ColumnMap, param: u32) -> bool {
    if column.field_type != target.binlog_type() {
        return false;
    }
    if column.field_type == FieldType::String
        && string_real_type(param).map_or(true, |rt| rt != target.real_type())
    {
        return false;
    }
    match target.compatible_field_size(param) {
        Some(Ordering::Equal) => true,
        Some(Ordering::Less) => matches!(
            target.kind,
            FieldKind::String { .. }
                | FieldKind::Varstring { .. }
                | FieldKind::Blob { .. }
                | FieldKind::Document
                | FieldKind::Bit { .. }
        ),
        _ => false,
    }
}

fn int_by_bytes(bytes: u32) -> Option<IntWidth> {
    Some(match bytes {
        1 => IntWidth::Tiny,
        2 => IntWidth::Short,
        3 => IntWidth::Medium,
        4 => IntWidth::Long,
        8 => IntWidth::LongLong,
        _ => return None,
    })
}

/// A field shaped like the source column, to unpack into before converting.
///
/// Signedness is not part of the table map and is taken from `target`.
/// ENUM and SET sources arrive as their numeric index.
pub fn conversion_field(target: &Field, field_type: FieldType, param: u32) -> Result<Field, FieldError> {
    let unsigned = target.is_unsigned();
    let cs: &'static CharsetInfo = if target.result_type() == ItemResult::String {
        target.charset()
    } else {
        &charset::BINARY
    };
    let int = |width: IntWidth| {
        (
            FieldKind::Int {
                width,
                unsigned,
                zerofill: false,
            },
            width.display_length(unsigned),
        )
    };
    let index = |bytes: u32| -> Result<(FieldKind, u32), FieldError> {
        let width = int_by_bytes(bytes)
            .ok_or_else(|| FieldError::Parse(format!("bad ENUM/SET pack length {}", bytes)))?;
        Ok((
            FieldKind::Int {
                width,
                unsigned: true,
                zerofill: false,
            },
            width.display_length(true),
        ))
    };
    let temporal = |kind: TemporalKind, dec: u8, width: u32| (FieldKind::Temporal { kind, dec }, width);
    let (kind, length) = match field_type {
        FieldType::Tiny => int(IntWidth::Tiny),
        FieldType::Short => int(IntWidth::Short),
        FieldType::Int24 => int(IntWidth::Medium),
        FieldType::Long => int(IntWidth::Long),
        FieldType::LongLong => int(IntWidth::LongLong),
        FieldType::Float => (
            FieldKind::Float {
                dec: NOT_FIXED_DEC,
                unsigned,
            },
            12,
        ),
        FieldType::Double => (
            FieldKind::Double {
                dec: NOT_FIXED_DEC,
                unsigned,
            },
            22,
        ),
        FieldType::NewDecimal => {
            let (precision, dec) = ((param >> 8) as u8, (param & 0xFF) as u8);
            (
                FieldKind::NewDecimal {
                    precision,
                    dec,
                    unsigned,
                },
                decimal::precision_to_length(precision, dec, unsigned),
            )
        }
        FieldType::Year => (FieldKind::Year, 4),
        FieldType::Date | FieldType::NewDate => temporal(TemporalKind::NewDate, 0, 10),
        FieldType::Time => temporal(TemporalKind::Time, 0, 10),
        FieldType::Time2 => temporal(TemporalKind::Time2, param as u8, 10),
        FieldType::DateTime => temporal(TemporalKind::DateTime, 0, 19),
        FieldType::DateTime2 => temporal(TemporalKind::DateTime2, param as u8, 19),
        FieldType::Timestamp => temporal(TemporalKind::Timestamp, 0, 19),
        FieldType::Timestamp2 => temporal(TemporalKind::Timestamp2, param as u8, 19),
        FieldType::Null => (FieldKind::Null, 0),
        FieldType::Varchar | FieldType::VarString => (
            FieldKind::Varstring {
                charset: cs,
                length_bytes: if param > 255 { 2 } else { 1 },
            },
            param,
        ),
        FieldType::String => match string_real_type(param)? {
            FieldType::Enum | FieldType::Set => index(param & 0xFF)?,
            _ => (FieldKind::String { charset: cs }, char_from_length(param) as u32),
        },
        FieldType::Enum | FieldType::Set => index(param & 0xFF)?,
        FieldType::TinyBlob | FieldType::Blob | FieldType::MediumBlob | FieldType::LongBlob | FieldType::Geometry => {
            let packlength = (param & 0xFF) as u8;
            if !(1..=4).contains(&packlength) {
                return Err(FieldError::Parse(format!("bad blob pack length {}", packlength)));
            }
            (
                FieldKind::Blob {
                    charset: cs,
                    packlength,
                    geometry: field_type == FieldType::Geometry,
                },
                ((1u64 << (8 * packlength as u32)) - 1).min(u32::MAX as u64) as u32,
            )
        }
        FieldType::Document => (FieldKind::Document, (1 << 24) - 1),
        FieldType::Bit => {
            let bits = (param >> 8) * 8 + (param & 0xFF);
            (
                FieldKind::Bit {
                    bytes_in_rec: (bits as usize + 7) / 8,
                    bit_len: 0,
                    bits: None,
                },
                bits,
            )
        }
        FieldType::Decimal => {
            return Err(FieldError::Argument(format!(
                "cannot convert pre-5.0 DECIMAL into column '{}'",
                target.name
            )))
        }
    };
    let mut field = Field::new(&target.name, kind, length);
    field.table_name = target.table_name.clone();
    Ok(field)
}

/// Apply a row image to `fields` bound in `row`.
///
/// Source columns beyond `fields` are skipped; target columns beyond the
/// source are left untouched. A malformed image leaves `row` as it was.
pub fn unpack_row(map: &TableMap, fields: &[Field], row: &mut RowBuffer, image: &[u8]) -> Result<UnpackedRow, FieldError> {
    let before = row.clone();
    let result = unpack_columns(map, fields, row, image);
    if result.is_err() {
        *row = before;
    }
    result
}

fn unpack_columns(map: &TableMap, fields: &[Field], row: &mut RowBuffer, image: &[u8]) -> Result<UnpackedRow, FieldError> {
    let n = map.columns.len();
    let bitmap_len = (n + 7) / 8;
    if image.len() < bitmap_len {
        return Err(FieldError::Parse(format!(
            "row image of {} bytes is shorter than its {} byte null bitmap",
            image.len(),
            bitmap_len
        )));
    }
    let (bitmap, _) = image.split_at(bitmap_len);
    let mut pos = bitmap_len;
    let mut status = ConversionStatus::Ok;

    for (i, column) in map.columns.iter().enumerate() {
        let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;
        let param = column.param()?;
        let Some(target) = fields.get(i) else {
            if !is_null {
                pos += skip_column(column, param, &image[pos..])?;
            }
            continue;
        };
        if is_null {
            status = status.merge(set_field_to_null(target, row));
            continue;
        }
        target.set_notnull(row);
        if can_unpack_directly(target, column, param) {
            pos += target.unpack(row, &image[pos..], param, true)?;
            continue;
        }
        debug!(
            column = %target.name,
            source = ?column.field_type,
            target = ?target.real_type(),
            "converting replicated column"
        );
        let conv = conversion_field(target, column.field_type, param)?;
        let mut scratch = RowBuffer::with_config(conv.pack_length().max(1), row.config().clone());
        pos += conv.unpack(&mut scratch, &image[pos..], param, true)?;
        status = status.merge(field_conv(target, row, &conv, &scratch));
    }
    Ok(UnpackedRow { status, used: pos })
}

fn skip_column(column: &ColumnMap, param: u32, from: &[u8]) -> Result<usize, FieldError> {
    let shape = Field::new("", FieldKind::Null, 0);
    let conv = conversion_field(&shape, column.field_type, param)?;
    let mut scratch = RowBuffer::new(conv.pack_length().max(1));
    conv.unpack(&mut scratch, from, param, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::schema::{ColumnDef, TableSchema};
    use crate::field::session::{CheckLevel, FieldConfig};

    fn open(columns: Vec<ColumnDef>) -> TableDef {
        TableSchema::new("t", columns).open(FieldConfig::default()).unwrap()
    }

    #[test]
    fn test_table_map_encoding() {
        let t = open(vec![
            ColumnDef::new("a", "int").not_null(),
            ColumnDef::new("b", "varchar(300)"),
            ColumnDef::new("c", "decimal(10,2)"),
            ColumnDef::new("d", "enum('x','y')"),
        ]);
        let map = TableMap::from_table(&t);
        assert_eq!(map.columns[1].metadata, vec![0x2C, 0x01]);
        assert_eq!(map.columns[1].param().unwrap(), 300);
        assert_eq!(map.columns[2].param().unwrap(), (10 << 8) | 2);
        assert_eq!(map.columns[3].field_type, FieldType::String);
        assert_eq!(map.columns[3].metadata, vec![FieldType::Enum.code(), 1]);
        let bytes = map.encode();
        assert_eq!(TableMap::decode(&bytes).unwrap(), map);
        assert!(TableMap::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_same_definition_round_trip() {
        let columns = vec![
            ColumnDef::new("a", "int"),
            ColumnDef::new("b", "varchar(20)"),
            ColumnDef::new("c", "blob"),
            ColumnDef::new("d", "bit(10)"),
            ColumnDef::new("e", "datetime(3)"),
        ];
        let mut src = open(columns.clone());
        let mut dst = open(columns);
        let f = src.fields.clone();
        for field in &f[..4] {
            field.set_notnull(&mut src.row);
        }
        f[0].store_int(&mut src.row, 77, false);
        f[1].store_str(&mut src.row, b"hello", &charset::LATIN1_SWEDISH_CI);
        f[2].store_str(&mut src.row, b"payload", &charset::BINARY);
        f[3].store_int(&mut src.row, 0x155, false);

        let image = pack_row(&f, &src.row);
        assert_eq!(image[0], 0b1_0000);
        let out = unpack_row(&TableMap::from_table(&src), &dst.fields.clone(), &mut dst.row, &image).unwrap();
        assert_eq!(out, UnpackedRow { status: ConversionStatus::Ok, used: image.len() });
        let g = &dst.fields;
        assert_eq!(g[0].val_int(&dst.row), 77);
        assert_eq!(g[1].val_string(&dst.row), "hello");
        assert_eq!(g[2].val_str(&dst.row).as_ref(), b"payload");
        assert_eq!(g[3].val_int(&dst.row), 0x155);
        assert!(g[4].is_null(&dst.row));
    }

    #[test]
    fn test_narrower_target_converts_with_warning() {
        let mut src = open(vec![ColumnDef::new("a", "int"), ColumnDef::new("b", "varchar(20)")]);
        let mut dst = open(vec![ColumnDef::new("a", "tinyint"), ColumnDef::new("b", "varchar(3)")]);
        let f = src.fields.clone();
        f[0].set_notnull(&mut src.row);
        f[1].set_notnull(&mut src.row);
        f[0].store_int(&mut src.row, 1000, false);
        f[1].store_str(&mut src.row, b"abcdef", &charset::LATIN1_SWEDISH_CI);
        let image = pack_row(&f, &src.row);
        let fields = dst.fields.clone();
        let out = unpack_row(&TableMap::from_table(&src), &fields, &mut dst.row, &image).unwrap();
        assert_eq!(out.status, ConversionStatus::WarnTruncated);
        assert_eq!(fields[0].val_int(&dst.row), 127);
        assert_eq!(fields[1].val_string(&dst.row), "abc");
        assert_eq!(dst.row.session().warnings().len(), 2);
    }

    #[test]
    fn test_decimal_scale_change() {
        let mut src = open(vec![ColumnDef::new("a", "decimal(10,3)")]);
        let mut dst = open(vec![ColumnDef::new("a", "decimal(8,1)")]);
        let f = src.fields[0].clone();
        f.set_notnull(&mut src.row);
        f.store_str(&mut src.row, b"12.345", &charset::LATIN1_SWEDISH_CI);
        let image = pack_row(&src.fields, &src.row);
        let fields = dst.fields.clone();
        let out = unpack_row(&TableMap::from_table(&src), &fields, &mut dst.row, &image).unwrap();
        assert_eq!(out.used, image.len());
        assert_eq!(fields[0].val_string(&dst.row), "12.3");
    }

    #[test]
    fn test_null_into_not_null_target() {
        let mut src = open(vec![ColumnDef::new("a", "int")]);
        let mut config = FieldConfig::default();
        config.check_level = CheckLevel::ErrorForNull;
        let mut dst = TableSchema::new("t", vec![ColumnDef::new("a", "int").not_null()])
            .open(config)
            .unwrap();
        src.fields[0].clone().set_null(&mut src.row);
        let image = pack_row(&src.fields, &src.row);
        let fields = dst.fields.clone();
        let out = unpack_row(&TableMap::from_table(&src), &fields, &mut dst.row, &image).unwrap();
        assert_eq!(out.status, ConversionStatus::ErrNullConstraintViolation);
    }

    #[test]
    fn test_extra_source_columns_are_skipped() {
        let mut src = open(vec![ColumnDef::new("a", "int"), ColumnDef::new("b", "varchar(10)")]);
        let mut dst = open(vec![ColumnDef::new("a", "int")]);
        let f = src.fields.clone();
        f[0].set_notnull(&mut src.row);
        f[1].set_notnull(&mut src.row);
        f[0].store_int(&mut src.row, 3, false);
        f[1].store_str(&mut src.row, b"zz", &charset::LATIN1_SWEDISH_CI);
        let image = pack_row(&f, &src.row);
        let fields = dst.fields.clone();
        let out = unpack_row(&TableMap::from_table(&src), &fields, &mut dst.row, &image).unwrap();
        assert_eq!(out.used, image.len());
        assert_eq!(fields[0].val_int(&dst.row), 3);
    }

    #[test]
    fn test_enum_source_into_int_target() {
        let mut src = open(vec![ColumnDef::new("a", "enum('x','y','z')")]);
        let mut dst = open(vec![ColumnDef::new("a", "int")]);
        let f = src.fields[0].clone();
        f.set_notnull(&mut src.row);
        f.store_str(&mut src.row, b"z", &charset::LATIN1_SWEDISH_CI);
        let image = pack_row(&src.fields, &src.row);
        let fields = dst.fields.clone();
        unpack_row(&TableMap::from_table(&src), &fields, &mut dst.row, &image).unwrap();
        assert_eq!(fields[0].val_int(&dst.row), 3);
    }

    #[test]
    fn test_truncated_image_is_an_error() {
        let mut src = open(vec![ColumnDef::new("a", "bigint")]);
        let f = src.fields[0].clone();
        f.set_notnull(&mut src.row);
        f.store_int(&mut src.row, 1, false);
        let image = pack_row(&src.fields, &src.row);
        let mut dst = open(vec![ColumnDef::new("a", "bigint")]);
        let fields = dst.fields.clone();
        let map = TableMap::from_table(&src);
        assert!(unpack_row(&map, &fields, &mut dst.row, &image[..4]).is_err());
    }

    #[test]
    fn test_failed_unpack_leaves_row_unchanged() {
        let columns = vec![ColumnDef::new("a", "int").not_null(), ColumnDef::new("b", "varchar(20)")];
        let mut src = open(columns.clone());
        let f = src.fields.clone();
        f[0].store_int(&mut src.row, 11, false);
        f[1].set_notnull(&mut src.row);
        f[1].store_str(&mut src.row, b"new value", &charset::LATIN1_SWEDISH_CI);
        let image = pack_row(&f, &src.row);

        let mut dst = open(columns);
        let g = dst.fields.clone();
        g[0].store_int(&mut dst.row, 5, false);
        g[1].set_notnull(&mut dst.row);
        g[1].store_str(&mut dst.row, b"old", &charset::LATIN1_SWEDISH_CI);
        let before = dst.row.bytes().to_vec();

        let map = TableMap::from_table(&src);
        assert!(unpack_row(&map, &g, &mut dst.row, &image[..image.len() - 3]).is_err());
        assert_eq!(dst.row.bytes(), before.as_slice());
        assert_eq!(g[0].val_int(&dst.row), 5);
        assert_eq!(g[1].val_string(&dst.row), "old");
    }
}
