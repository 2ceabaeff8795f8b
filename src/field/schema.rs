//! Table definitions and record layout.
//!
//! A [`TableSchema`] lists columns with DDL-style type strings. Opening it as
//! a [`TableDef`] builds the [`Field`]s, lays out the record and allocates
//! the record buffers:
//!
//! 1. The null bitmap: one bit per nullable column, each followed by the
//!    leftover high bits of a BIT column when those live in the bitmap.
//! 2. Column images in declaration order.
//!
//! The row buffer holds three records back to back: `record[0]` (current
//! row), `record[1]` (before image) and the default-values record.
//!
//! ```
//! use rowfield::field::schema::TableSchema;
//! use rowfield::field::session::FieldConfig;
//!
//! let schema = TableSchema::from_json(r#"{
//!     "name": "t1",
//!     "columns": [
//!         { "name": "id", "column_type": "int unsigned", "is_nullable": false },
//!         { "name": "flags", "column_type": "bit(10)" }
//!     ]
//! }"#).unwrap();
//! let table = schema.open(FieldConfig::default()).unwrap();
//! // one null bit plus two leftover BIT bits share the first byte
//! assert_eq!(table.null_bytes, 1);
//! assert_eq!(table.reclength, 1 + 4 + 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::field::base::{Field, FieldKind, IntWidth, TemporalKind};
use crate::field::charset::{self, CharsetInfo};
use crate::field::decimal;
use crate::field::doc_field::{DocPathField, DocType};
use crate::field::document::KeyPath;
use crate::field::row::{validate_layout, BitClaim, BitRange, NullBit, RowBuffer};
use crate::field::session::FieldConfig;
use crate::field::string;
use crate::field::types::{
    flags, get_enum_pack_length, get_set_pack_length, AutoInit, DATETIME_MAX_DECIMALS, DECIMAL_MAX_PRECISION,
    DECIMAL_MAX_SCALE, NOT_FIXED_DEC,
};
use crate::FieldError;

const CURRENT_TIMESTAMP: &str = "CURRENT_TIMESTAMP";

fn default_true() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !v
}

/// Column definition as written in a schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// SQL type string (e.g., "varchar(100)", "int unsigned").
    pub column_type: String,
    /// Whether the column allows NULL.
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    /// Default value text; `NULL` and `CURRENT_TIMESTAMP` are recognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// `CURRENT_TIMESTAMP` for ON UPDATE CURRENT_TIMESTAMP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    /// Whether the column is AUTO_INCREMENT.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_auto_increment: bool,
    /// Collation or character set name for string columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl ColumnDef {
    pub fn new(name: &str, column_type: &str) -> Self {
        ColumnDef {
            name: name.to_string(),
            column_type: column_type.to_string(),
            is_nullable: true,
            default_value: None,
            on_update: None,
            is_auto_increment: false,
            collation: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    fn charset(&self) -> Result<&'static CharsetInfo, FieldError> {
        match &self.collation {
            None => Ok(&charset::LATIN1_SWEDISH_CI),
            Some(name) => charset::get_charset_by_name(name).ok_or_else(|| {
                FieldError::Argument(format!("Unknown collation '{}' for column '{}'", name, self.name))
            }),
        }
    }
}

/// A table: a name plus its columns in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Keep the leftover bits of BIT columns in the null bitmap.
    #[serde(default = "default_true")]
    pub bits_in_null_bitmap: bool,
}

impl TableSchema {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> Self {
        TableSchema {
            name: name.to_string(),
            columns,
            bits_in_null_bitmap: true,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, FieldError> {
        serde_json::from_str(text).map_err(|e| FieldError::Parse(format!("Invalid table schema: {}", e)))
    }

    pub fn load(path: &str) -> Result<Self, FieldError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| FieldError::Io(format!("Cannot read {}: {}", path, e)))?;
        Self::from_json(&text)
    }

    pub fn open(&self, config: FieldConfig) -> Result<TableDef, FieldError> {
        TableDef::open(self, config)
    }
}

// -------------------------------------------------------------------------
// Type strings

struct TypeTokens {
    name: String,
    args: Vec<String>,
    modifiers: Vec<String>,
}

fn tokenize(text: &str) -> Result<TypeTokens, FieldError> {
    let text = text.trim();
    let name_end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    if name_end == 0 {
        return Err(FieldError::Parse(format!("Missing type name in '{}'", text)));
    }
    let name = text[..name_end].to_ascii_lowercase();
    let mut rest = text[name_end..].trim_start();
    let mut args = Vec::new();
    if let Some(inner) = rest.strip_prefix('(') {
        let mut chars = inner.char_indices().peekable();
        let mut current = String::new();
        let mut in_quote = false;
        let mut close = None;
        while let Some((i, c)) = chars.next() {
            if in_quote {
                if c == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        current.push('\'');
                        chars.next();
                    } else {
                        in_quote = false;
                    }
                } else {
                    current.push(c);
                }
                continue;
            }
            match c {
                '\'' => in_quote = true,
                ',' => args.push(std::mem::take(&mut current).trim().to_string()),
                ')' => {
                    close = Some(i);
                    break;
                }
                c if c.is_whitespace() => {}
                c => current.push(c),
            }
        }
        let Some(close) = close else {
            return Err(FieldError::Parse(format!("Unbalanced parentheses in '{}'", text)));
        };
        args.push(current);
        rest = &inner[close + 1..];
    }
    let modifiers = rest.split_whitespace().map(|w| w.to_ascii_lowercase()).collect();
    Ok(TypeTokens { name, args, modifiers })
}

fn number_arg(t: &TypeTokens, i: usize, default: u32) -> Result<u32, FieldError> {
    match t.args.get(i) {
        None => Ok(default),
        Some(a) if a.is_empty() && i == 0 && t.args.len() == 1 => Ok(default),
        Some(a) => a
            .parse()
            .map_err(|_| FieldError::Parse(format!("Bad length '{}' for type {}", a, t.name))),
    }
}

fn fsp_arg(t: &TypeTokens) -> Result<u8, FieldError> {
    let fsp = number_arg(t, 0, 0)?;
    if fsp > DATETIME_MAX_DECIMALS as u32 {
        return Err(FieldError::Argument(format!(
            "Fractional precision {} for {} exceeds {}",
            fsp, t.name, DATETIME_MAX_DECIMALS
        )));
    }
    Ok(fsp as u8)
}

fn fsp_width(base: u32, fsp: u8) -> u32 {
    if fsp > 0 {
        base + 1 + fsp as u32
    } else {
        base
    }
}

/// Parse a DDL type string such as `decimal(5,2) unsigned` into a field kind
/// and display length. `cs` applies to character columns.
pub fn parse_column_type(text: &str, cs: &'static CharsetInfo) -> Result<(FieldKind, u32), FieldError> {
    let t = tokenize(text)?;
    let unsigned = t.modifiers.iter().any(|m| m == "unsigned");
    let zerofill = t.modifiers.iter().any(|m| m == "zerofill");
    let int = |width: IntWidth| -> Result<(FieldKind, u32), FieldError> {
        let len = number_arg(&t, 0, width.display_length(unsigned || zerofill))?;
        Ok((
            FieldKind::Int {
                width,
                unsigned: unsigned || zerofill,
                zerofill,
            },
            len,
        ))
    };
    let (kind, length) = match t.name.as_str() {
        "tinyint" | "bool" | "boolean" => int(IntWidth::Tiny)?,
        "smallint" => int(IntWidth::Short)?,
        "mediumint" => int(IntWidth::Medium)?,
        "int" | "integer" => int(IntWidth::Long)?,
        "bigint" => int(IntWidth::LongLong)?,
        "float" | "double" | "real" => {
            let is_float = t.name == "float";
            let (len, dec) = if t.args.len() >= 2 {
                let dec = number_arg(&t, 1, 0)?;
                if dec >= NOT_FIXED_DEC as u32 {
                    return Err(FieldError::Argument(format!("Too many decimals ({}) in '{}'", dec, text)));
                }
                (number_arg(&t, 0, 0)?, dec as u8)
            } else {
                (if is_float { 12 } else { 22 }, NOT_FIXED_DEC)
            };
            let kind = if is_float {
                FieldKind::Float { dec, unsigned }
            } else {
                FieldKind::Double { dec, unsigned }
            };
            (kind, len)
        }
        "decimal" | "numeric" | "dec" => {
            let precision = number_arg(&t, 0, 10)?;
            let scale = number_arg(&t, 1, 0)?;
            if precision == 0
                || precision > DECIMAL_MAX_PRECISION as u32
                || scale > DECIMAL_MAX_SCALE as u32
                || scale > precision
            {
                return Err(FieldError::Argument(format!("Bad precision/scale in '{}'", text)));
            }
            let (p, s) = (precision as u8, scale as u8);
            (
                FieldKind::NewDecimal {
                    precision: p,
                    dec: s,
                    unsigned,
                },
                decimal::precision_to_length(p, s, unsigned),
            )
        }
        "year" => (FieldKind::Year, 4),
        "date" => (
            FieldKind::Temporal {
                kind: TemporalKind::NewDate,
                dec: 0,
            },
            10,
        ),
        "time" => {
            let dec = fsp_arg(&t)?;
            (
                FieldKind::Temporal {
                    kind: TemporalKind::Time2,
                    dec,
                },
                fsp_width(10, dec),
            )
        }
        "datetime" => {
            let dec = fsp_arg(&t)?;
            (
                FieldKind::Temporal {
                    kind: TemporalKind::DateTime2,
                    dec,
                },
                fsp_width(19, dec),
            )
        }
        "timestamp" => {
            let dec = fsp_arg(&t)?;
            (
                FieldKind::Temporal {
                    kind: TemporalKind::Timestamp2,
                    dec,
                },
                fsp_width(19, dec),
            )
        }
        "char" | "binary" => {
            let cs = if t.name == "binary" { &charset::BINARY } else { cs };
            let chars = number_arg(&t, 0, 1)?;
            let bytes = chars * cs.mbmaxlen as u32;
            if bytes > 255 {
                return Err(FieldError::Argument(format!("Column length too big in '{}'", text)));
            }
            (FieldKind::String { charset: cs }, bytes)
        }
        "varchar" | "varbinary" => {
            let cs = if t.name == "varbinary" { &charset::BINARY } else { cs };
            let Some(chars) = t.args.first().filter(|a| !a.is_empty()) else {
                return Err(FieldError::Parse(format!("{} needs a length", t.name)));
            };
            let chars: u32 = chars
                .parse()
                .map_err(|_| FieldError::Parse(format!("Bad length '{}' for type {}", chars, t.name)))?;
            let bytes = chars * cs.mbmaxlen as u32;
            if bytes > 65_535 {
                return Err(FieldError::Argument(format!("Column length too big in '{}'", text)));
            }
            let length_bytes = if bytes < 256 { 1 } else { 2 };
            (FieldKind::Varstring { charset: cs, length_bytes }, bytes)
        }
        "tinytext" | "text" | "mediumtext" | "longtext" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
            let cs = if t.name.ends_with("blob") { &charset::BINARY } else { cs };
            let packlength: u8 = match t.name.trim_end_matches("text").trim_end_matches("blob") {
                "tiny" => 1,
                "" => 2,
                "medium" => 3,
                _ => 4,
            };
            let max = ((1u64 << (8 * packlength as u32)) - 1).min(u32::MAX as u64) as u32;
            (
                FieldKind::Blob {
                    charset: cs,
                    packlength,
                    geometry: false,
                },
                max,
            )
        }
        "geometry" | "point" | "linestring" | "polygon" => (
            FieldKind::Blob {
                charset: &charset::BINARY,
                packlength: 4,
                geometry: true,
            },
            u32::MAX,
        ),
        "enum" | "set" => {
            if t.args.is_empty() || t.args.iter().all(|a| a.is_empty()) {
                return Err(FieldError::Parse(format!("{} needs at least one value", t.name)));
            }
            let values = t.args.clone();
            let longest = values.iter().map(|v| v.chars().count()).max().unwrap_or(0) as u32;
            if t.name == "enum" {
                let packlength = get_enum_pack_length(values.len()) as u8;
                (
                    FieldKind::Enum {
                        charset: cs,
                        packlength,
                        values,
                    },
                    longest * cs.mbmaxlen as u32,
                )
            } else {
                if values.len() > 64 {
                    return Err(FieldError::Argument(format!("Too many members in '{}'", text)));
                }
                let packlength = get_set_pack_length(values.len()) as u8;
                let len = (values.iter().map(|v| v.chars().count()).sum::<usize>() + values.len() - 1) as u32;
                (
                    FieldKind::Set {
                        charset: cs,
                        packlength,
                        values,
                    },
                    len * cs.mbmaxlen as u32,
                )
            }
        }
        "bit" => {
            let n = number_arg(&t, 0, 1)?;
            if n == 0 || n > 64 {
                return Err(FieldError::Argument(format!("BIT length must be 1..64 in '{}'", text)));
            }
            (
                FieldKind::Bit {
                    bytes_in_rec: (n as usize + 7) / 8,
                    bit_len: 0,
                    bits: None,
                },
                n,
            )
        }
        "document" | "json" => (FieldKind::Document, (1 << 24) - 1),
        other => return Err(FieldError::Parse(format!("Unknown column type '{}'", other))),
    };
    Ok((kind, length))
}

// -------------------------------------------------------------------------
// Opened tables

/// An opened table: fields bound to `record[0]` of one row buffer.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub fields: Vec<Field>,
    /// Bytes of null bitmap at the start of each record.
    pub null_bytes: usize,
    /// Length of one record.
    pub reclength: usize,
    /// `record[0]`, `record[1]` and the default-values record.
    pub row: RowBuffer,
}

impl TableDef {
    pub fn open(schema: &TableSchema, config: FieldConfig) -> Result<TableDef, FieldError> {
        let mut kinds = Vec::with_capacity(schema.columns.len());
        for col in &schema.columns {
            let (mut kind, length) = parse_column_type(&col.column_type, col.charset()?)?;
            if schema.bits_in_null_bitmap {
                if let FieldKind::Bit { bytes_in_rec, bit_len, .. } = &mut kind {
                    *bytes_in_rec = (length / 8) as usize;
                    *bit_len = (length % 8) as u8;
                }
            }
            kinds.push((kind, length));
        }

        // Null bitmap: each column's null bit, then its leftover BIT bits.
        let mut bit_pos = 0usize;
        let mut claims = Vec::new();
        let mut placed = Vec::with_capacity(kinds.len());
        for (col, (mut kind, length)) in schema.columns.iter().zip(kinds) {
            let null = if col.is_nullable {
                let nb = NullBit::new(bit_pos / 8, 1 << (bit_pos % 8));
                bit_pos += 1;
                claims.push((col.name.clone(), BitClaim::Null(nb)));
                Some(nb)
            } else {
                None
            };
            if let FieldKind::Bit { bit_len, bits, .. } = &mut kind {
                if *bit_len > 0 {
                    let range = BitRange {
                        offset: bit_pos / 8,
                        shift: (bit_pos % 8) as u8,
                        len: *bit_len,
                    };
                    bit_pos += *bit_len as usize;
                    claims.push((col.name.clone(), BitClaim::Bits(range)));
                    *bits = Some(range);
                }
            }
            placed.push((kind, length, null));
        }
        validate_layout(&claims)?;
        let null_bytes = (bit_pos + 7) / 8;

        let mut fields = Vec::with_capacity(placed.len());
        let mut ptr = null_bytes;
        for (i, (col, (kind, length, null))) in schema.columns.iter().zip(placed).enumerate() {
            let mut field = Field::new(&col.name, kind, length).at(ptr);
            if let Some(nb) = null {
                field = field.with_null(nb);
            }
            field.table_name = schema.name.clone();
            field.field_index = i;
            if col.is_auto_increment {
                field.flags |= flags::AUTO_INCREMENT;
            }
            field.auto_init = auto_init_of(col, &field)?;
            if col.default_value.is_none() && !col.is_nullable && !col.is_auto_increment {
                field.flags |= flags::NO_DEFAULT_VALUE;
            }
            if field.auto_init.has_update_default_function() {
                field.flags |= flags::ON_UPDATE_NOW;
            }
            ptr += field.rec_length();
            fields.push(field);
        }
        let reclength = ptr.max(1);

        let mut table = TableDef {
            name: schema.name.clone(),
            fields,
            null_bytes,
            reclength,
            row: RowBuffer::with_config(3 * reclength, config),
        };
        table.fill_default_record(schema)?;
        table.row.session_mut().reset_counters();
        table.restore_record(0, 2);
        table.restore_record(1, 2);
        Ok(table)
    }

    fn fill_default_record(&mut self, schema: &TableSchema) -> Result<(), FieldError> {
        let offset = self.default_offset();
        for (col, field) in schema.columns.iter().zip(&self.fields) {
            let mut d = field.clone();
            d.move_field_offset(offset);
            match col.default_value.as_deref() {
                Some(v) if v.eq_ignore_ascii_case("NULL") => {
                    if !d.real_maybe_null() {
                        return Err(FieldError::Argument(format!("Invalid default value for '{}'", col.name)));
                    }
                    d.set_null(&mut self.row);
                    d.reset(&mut self.row);
                }
                Some(v) if v.eq_ignore_ascii_case(CURRENT_TIMESTAMP) => {
                    d.set_notnull(&mut self.row);
                    d.reset(&mut self.row);
                }
                Some(v) => {
                    d.set_notnull(&mut self.row);
                    let status = d.store_str(&mut self.row, v.as_bytes(), &charset::UTF8MB4_BIN);
                    if status.is_error() || status == crate::field::status::ConversionStatus::WarnOutOfRange {
                        return Err(FieldError::Argument(format!(
                            "Invalid default value for '{}': {}",
                            col.name, v
                        )));
                    }
                }
                None if d.real_maybe_null() => {
                    d.set_null(&mut self.row);
                    d.reset(&mut self.row);
                }
                None => {
                    d.reset(&mut self.row);
                }
            }
        }
        Ok(())
    }

    /// Byte offset of record `n`.
    pub fn record_offset(&self, n: usize) -> usize {
        n * self.reclength
    }

    /// Distance from `record[0]` to the default-values record.
    pub fn default_offset(&self) -> isize {
        self.record_offset(2) as isize
    }

    pub fn record(&self, n: usize) -> &[u8] {
        self.row.slice(self.record_offset(n), self.reclength)
    }

    /// Copy record `from` over record `to`.
    ///
    /// Blob payloads are shared between the two records afterwards; the
    /// payloads the overwritten record held are released.
    pub fn restore_record(&mut self, to: usize, from: usize) {
        let (src, dst) = (self.record_offset(from), self.record_offset(to));
        let handles: Vec<(u64, u64)> = self
            .fields
            .iter()
            .filter_map(|f| {
                let new = string::blob_handle_at(f, &self.row, f.ptr + src)?;
                let old = string::blob_handle_at(f, &self.row, f.ptr + dst)?;
                Some((new, old))
            })
            .collect();
        self.row.copy_within(src, dst, self.reclength);
        for (new, old) in handles {
            self.row.retain_blob(new);
            self.row.release_blob(old);
        }
    }

    /// Save `record[0]` as the before image in `record[1]`.
    pub fn store_record(&mut self) {
        self.restore_record(1, 0);
    }

    /// Load every column default into `record[0]`, evaluating
    /// CURRENT_TIMESTAMP defaults.
    pub fn set_defaults(&mut self) {
        let offset = self.default_offset();
        for field in &self.fields {
            field.set_default(&mut self.row, offset);
        }
    }

    /// Apply ON UPDATE CURRENT_TIMESTAMP columns; true when any fired.
    pub fn update_defaults(&mut self) -> bool {
        let mut fired = false;
        for field in &self.fields {
            fired |= field.evaluate_update_default_function(&mut self.row);
        }
        fired
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.check_field_name_match(None, name))
    }

    /// Field clones bound to record `n`.
    pub fn fields_in_record(&self, n: usize) -> Vec<Field> {
        let diff = self.record_offset(n) as isize;
        self.fields
            .iter()
            .map(|f| {
                let mut f = f.clone();
                f.move_field_offset(diff);
                f
            })
            .collect()
    }

    /// A path column below the document column `column`.
    pub fn doc_path(&self, column: &str, path: &str, doc_type: DocType, key_len: usize) -> Result<DocPathField, FieldError> {
        let root = self
            .field(column)
            .ok_or_else(|| FieldError::Argument(format!("Unknown column '{}' in '{}'", column, self.name)))?;
        DocPathField::new(root, KeyPath::parse(path)?, doc_type, key_len)
    }
}

fn auto_init_of(col: &ColumnDef, field: &Field) -> Result<AutoInit, FieldError> {
    let default_now = col
        .default_value
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case(CURRENT_TIMESTAMP));
    let update_now = match col.on_update.as_deref() {
        None => false,
        Some(v) if v.eq_ignore_ascii_case(CURRENT_TIMESTAMP) => true,
        Some(v) => {
            return Err(FieldError::Argument(format!(
                "Unsupported ON UPDATE '{}' for '{}'",
                v, col.name
            )))
        }
    };
    let temporal_with_date = field.field_type().is_temporal_with_date();
    if (default_now || update_now) && !temporal_with_date {
        return Err(FieldError::Argument(format!(
            "CURRENT_TIMESTAMP needs a DATETIME or TIMESTAMP column, '{}' is {}",
            col.name,
            field.sql_type()
        )));
    }
    if col.is_auto_increment {
        return Ok(AutoInit::NextNumber);
    }
    Ok(match (default_now, update_now) {
        (true, true) => AutoInit::DefaultAndOnUpdateNow,
        (true, false) => AutoInit::DefaultNow,
        (false, true) => AutoInit::OnUpdateNow,
        (false, false) => AutoInit::None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::status::ConversionStatus;
    use crate::field::time::Timeval;
    use crate::field::types::FieldType;

    fn kind(text: &str) -> (FieldKind, u32) {
        parse_column_type(text, &charset::LATIN1_SWEDISH_CI).unwrap()
    }

    #[test]
    fn test_parse_integers() {
        let (k, len) = kind("int unsigned");
        assert_eq!(
            k,
            FieldKind::Int {
                width: IntWidth::Long,
                unsigned: true,
                zerofill: false
            }
        );
        assert_eq!(len, 10);
        assert_eq!(kind("tinyint(3) zerofill").1, 3);
        assert_eq!(kind("BIGINT").1, 20);
    }

    #[test]
    fn test_parse_decimal_and_float() {
        let (k, len) = kind("decimal(5,2)");
        assert_eq!(
            k,
            FieldKind::NewDecimal {
                precision: 5,
                dec: 2,
                unsigned: false
            }
        );
        assert_eq!(len, 7);
        assert!(parse_column_type("decimal(66,2)", &charset::BINARY).is_err());
        assert!(parse_column_type("decimal(5,6)", &charset::BINARY).is_err());
        assert_eq!(kind("double").0, FieldKind::Double { dec: NOT_FIXED_DEC, unsigned: false });
        assert_eq!(kind("float(7,3)"), (FieldKind::Float { dec: 3, unsigned: false }, 7));
    }

    #[test]
    fn test_parse_strings() {
        let (k, len) = parse_column_type("varchar(100)", &charset::UTF8MB4_GENERAL_CI).unwrap();
        assert_eq!(len, 400);
        assert!(matches!(k, FieldKind::Varstring { length_bytes: 2, .. }));
        assert!(matches!(kind("varchar(20)").0, FieldKind::Varstring { length_bytes: 1, .. }));
        assert!(parse_column_type("varchar", &charset::BINARY).is_err());
        let (k, _) = kind("mediumblob");
        assert!(matches!(k, FieldKind::Blob { packlength: 3, geometry: false, .. }));
        assert_eq!(kind("binary(4)").0, FieldKind::String { charset: &charset::BINARY });
    }

    #[test]
    fn test_parse_enum_with_quotes() {
        let (k, len) = kind("enum('a','it''s', 'c d')");
        match k {
            FieldKind::Enum { values, packlength, .. } => {
                assert_eq!(values, vec!["a", "it's", "c d"]);
                assert_eq!(packlength, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(len, 4);
        assert!(matches!(kind("set('x','y')").0, FieldKind::Set { packlength: 1, .. }));
    }

    #[test]
    fn test_parse_temporal() {
        assert_eq!(
            kind("datetime(3)"),
            (
                FieldKind::Temporal {
                    kind: TemporalKind::DateTime2,
                    dec: 3
                },
                23
            )
        );
        assert!(parse_column_type("time(7)", &charset::BINARY).is_err());
        assert!(parse_column_type("frobnicate", &charset::BINARY).is_err());
    }

    #[test]
    fn test_pack_length_matches_type_width() {
        use crate::field::types::calc_pack_length;
        for text in ["int", "double", "datetime(3)", "time(6)", "timestamp(2)", "varchar(300)", "char(5)", "blob"] {
            let (k, len) = kind(text);
            let f = Field::new("c", k, len);
            assert_eq!(calc_pack_length(f.real_type(), f.field_length), f.pack_length(), "{}", text);
        }
    }

    fn table(columns: Vec<ColumnDef>) -> TableDef {
        TableSchema::new("t", columns).open(FieldConfig::default()).unwrap()
    }

    #[test]
    fn test_layout_shares_null_byte_with_bit_leftovers() {
        let t = table(vec![
            ColumnDef::new("a", "int"),
            ColumnDef::new("b", "bit(12)").not_null(),
            ColumnDef::new("c", "bit(7)"),
            ColumnDef::new("d", "char(2)"),
        ]);
        // a:null bit 0, b:bits 1..4, c:null bit 5, bits 6..12
        assert_eq!(t.null_bytes, 2);
        assert_eq!(t.fields[0].null, Some(NullBit::new(0, 0x01)));
        match t.fields[1].kind {
            FieldKind::Bit { bits: Some(r), bytes_in_rec, .. } => {
                assert_eq!((r.offset, r.shift, r.len), (0, 1, 4));
                assert_eq!(bytes_in_rec, 1);
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.fields[2].null, Some(NullBit::new(0, 0x20)));
        assert_eq!(t.fields[1].ptr, 2 + 4);
        assert_eq!(t.fields[2].pack_length_in_rec(), 0);
        assert_eq!(t.fields[3].ptr, 2 + 4 + 1);
        assert_eq!(t.reclength, 2 + 4 + 1 + 2);
    }

    #[test]
    fn test_defaults_record() {
        let mut t = table(vec![
            ColumnDef::new("a", "int").not_null().with_default("42"),
            ColumnDef::new("b", "varchar(10)"),
            ColumnDef::new("c", "int").not_null(),
        ]);
        let a = t.fields[0].clone();
        let b = t.fields[1].clone();
        assert_eq!(a.val_int(&t.row), 42);
        assert!(b.is_null(&t.row));
        assert!(t.fields[2].flags & flags::NO_DEFAULT_VALUE != 0);

        a.store_int(&mut t.row, 7, false);
        b.set_notnull(&mut t.row);
        b.store_str(&mut t.row, b"x", &charset::LATIN1_SWEDISH_CI);
        t.set_defaults();
        assert_eq!(a.val_int(&t.row), 42);
        assert!(b.is_null(&t.row));
    }

    #[test]
    fn test_bad_defaults_rejected() {
        let bad = TableSchema::new("t", vec![ColumnDef::new("a", "int").not_null().with_default("NULL")]);
        assert!(bad.open(FieldConfig::default()).is_err());
        let bad = TableSchema::new("t", vec![ColumnDef::new("a", "tinyint").with_default("1000")]);
        assert!(bad.open(FieldConfig::default()).is_err());
        let mut col = ColumnDef::new("a", "int");
        col.on_update = Some(CURRENT_TIMESTAMP.to_string());
        assert!(TableSchema::new("t", vec![col]).open(FieldConfig::default()).is_err());
    }

    #[test]
    fn test_timestamp_defaults_use_session_clock() {
        let mut col = ColumnDef::new("ts", "timestamp").not_null().with_default(CURRENT_TIMESTAMP);
        col.on_update = Some(CURRENT_TIMESTAMP.to_string());
        let mut t = table(vec![col, ColumnDef::new("n", "int")]);
        let ts = t.fields[0].clone();
        assert_eq!(ts.auto_init, AutoInit::DefaultAndOnUpdateNow);
        assert_eq!(ts.field_type(), FieldType::Timestamp);
        t.row.session_mut().set_clock(Timeval { sec: 1_000_000, usec: 0 });
        t.set_defaults();
        assert_eq!(ts.get_timestamp(&t.row), Some(Timeval { sec: 1_000_000, usec: 0 }));
        t.row.session_mut().set_clock(Timeval { sec: 2_000_000, usec: 0 });
        assert!(t.update_defaults());
        assert_eq!(ts.get_timestamp(&t.row).map(|tv| tv.sec), Some(2_000_000));
    }

    #[test]
    fn test_records_and_cmp_offset() {
        let mut t = table(vec![ColumnDef::new("a", "int")]);
        let a = t.fields[0].clone();
        a.set_notnull(&mut t.row);
        a.store_int(&mut t.row, 5, false);
        t.store_record();
        assert_eq!(a.cmp_offset(&t.row, t.reclength), std::cmp::Ordering::Equal);
        a.store_int(&mut t.row, 9, false);
        assert_eq!(a.cmp_offset(&t.row, t.reclength), std::cmp::Ordering::Greater);
        let before = &t.fields_in_record(1)[0];
        assert_eq!(before.val_int(&t.row), 5);
        assert_eq!(t.field("A").map(|f| f.field_index), Some(0));
        assert_eq!(
            t.fields[0].store_str(&mut t.row, b"12", &charset::BINARY),
            ConversionStatus::Ok
        );
    }

    #[test]
    fn test_record_copies_share_blob_payloads() {
        let mut t = table(vec![ColumnDef::new("b", "blob")]);
        let b = t.fields[0].clone();
        b.set_notnull(&mut t.row);
        b.store_str(&mut t.row, b"first", &charset::BINARY);
        t.store_record();
        b.store_str(&mut t.row, b"second", &charset::BINARY);
        let before = t.fields_in_record(1)[0].clone();
        assert_eq!(before.val_str(&t.row).as_ref(), b"first");
        assert_eq!(t.row.blobs().len(), 2);

        b.store_str(&mut t.row, b"third", &charset::BINARY);
        assert_eq!(t.row.blobs().len(), 2);
        assert_eq!(t.row.blobs().capacity(), 2);

        t.restore_record(0, 1);
        assert_eq!(b.val_str(&t.row).as_ref(), b"first");
        assert_eq!(t.row.blobs().len(), 1);

        t.set_defaults();
        assert!(b.is_null(&t.row));
        assert_eq!(before.val_str(&t.row).as_ref(), b"first");
        assert_eq!(t.row.blobs().len(), 1);
    }

    #[test]
    fn test_doc_path_lookup() {
        let t = table(vec![ColumnDef::new("doc", "document")]);
        let p = t.doc_path("doc", "a.b", DocType::Int, 8).unwrap();
        assert_eq!(p.root, 0);
        assert!(t.doc_path("nope", "a", DocType::Document, 0).is_err());
    }
}
