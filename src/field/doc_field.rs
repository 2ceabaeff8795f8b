//! Document columns and the path columns derived from them.
//!
//! The root column is an ordinary [`Field`] of kind [`FieldKind::Document`]
//! whose blob holds the canonical JSON text of an object or array. A
//! [`DocPathField`] names a node below that root by [`KeyPath`]; it owns no
//! storage and resolves the path against the root's current value on every
//! access.

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::field::base::{Field, FieldKind, IntWidth};
use crate::field::charset::{self, CharsetInfo};
use crate::field::decimal::decimal_to_f64;
use crate::field::document::{self, DocumentError, KeyPath, NodeKind};
use crate::field::row::{NullBit, RowBuffer};
use crate::field::status::{ConversionStatus, WarningCode, WarningLevel};
use crate::field::string;
use crate::field::types::{FieldType, ItemResult, KeyType, KEY_BLOB_LENGTH, NOT_FIXED_DEC};
use crate::FieldError;

fn warn_invalid(f: &Field, row: &mut RowBuffer, err: &DocumentError) {
    let message = match err {
        DocumentError::Invalid { offset, message } => {
            format!("Invalid document value at offset {}: {}", offset, message)
        }
        other => format!("Invalid document value: {}", other),
    };
    f.warn(row, WarningLevel::Warning, WarningCode::InvalidDocument, message);
}

fn warn_too_big(f: &Field, row: &mut RowBuffer, len: usize) {
    f.warn(
        row,
        WarningLevel::Warning,
        WarningCode::DocumentTooBig,
        format!("Document of {} bytes exceeds the column maximum of {}", len, f.max_data_length()),
    );
}

/// Store a whole document into a root column.
///
/// Invalid text or a scalar root is rejected with `ErrBadValue`; a value
/// longer than the column allows gets `WarnOutOfRange`. In both cases the
/// previous content is left in place.
pub(crate) fn store_root(f: &Field, row: &mut RowBuffer, s: &[u8]) -> ConversionStatus {
    let value = match document::parse_root(s) {
        Ok(v) => v,
        Err(e) => {
            warn_invalid(f, row, &e);
            return ConversionStatus::ErrBadValue;
        }
    };
    let bytes = document::to_bytes(&value);
    if bytes.len() > f.max_data_length() {
        warn_too_big(f, row, bytes.len());
        return ConversionStatus::WarnOutOfRange;
    }
    string::write_blob(f, row, bytes);
    ConversionStatus::Ok
}

/// Current tree of a root column; `None` when NULL or empty.
pub fn root_value(f: &Field, row: &RowBuffer) -> Option<Value> {
    if f.is_null(row) {
        return None;
    }
    let data = f.val_str(row);
    if data.is_empty() {
        return None;
    }
    document::parse(&data).ok()
}

/// Declared leaf type of a path column, fixed by the index defined on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    Tiny,
    Int,
    Double,
    String,
    Document,
}

impl DocType {
    pub fn from_field_type(ft: FieldType) -> Option<DocType> {
        match ft {
            FieldType::Tiny => Some(DocType::Tiny),
            FieldType::LongLong => Some(DocType::Int),
            FieldType::Double => Some(DocType::Double),
            FieldType::String => Some(DocType::String),
            FieldType::Document => Some(DocType::Document),
            _ => None,
        }
    }

    /// True when a node of kind `kind` can be read as this type.
    fn accepts(self, kind: NodeKind) -> bool {
        match self {
            DocType::Tiny | DocType::Int => matches!(kind, NodeKind::Int | NodeKind::Bool),
            DocType::Double => matches!(kind, NodeKind::Int | NodeKind::Double),
            DocType::String => kind == NodeKind::String,
            DocType::Document => true,
        }
    }
}

/// A column that reads and writes one node of a root document column.
#[derive(Debug, Clone, PartialEq)]
pub struct DocPathField {
    /// Index of the root document column in its table.
    pub root: usize,
    pub path: KeyPath,
    pub doc_type: DocType,
    /// Key length declared by the index, 0 for plain document access.
    pub key_len: usize,
}

impl DocPathField {
    pub fn new(root: &Field, path: KeyPath, doc_type: DocType, key_len: usize) -> Result<DocPathField, FieldError> {
        if !matches!(root.kind, FieldKind::Document) {
            return Err(FieldError::Argument(format!(
                "column '{}' is not a document column",
                root.name
            )));
        }
        let field = DocPathField {
            root: root.field_index,
            path,
            doc_type,
            key_len,
        };
        if !field.validate_doc_type() {
            return Err(FieldError::Argument(format!(
                "key length {} does not fit document path type {:?}",
                key_len, doc_type
            )));
        }
        Ok(field)
    }

    /// A path column reaching further below this one.
    pub fn derive(&self, more: &KeyPath) -> DocPathField {
        DocPathField {
            root: self.root,
            path: self.path.join(more),
            doc_type: DocType::Document,
            key_len: 0,
        }
    }

    pub fn validate_doc_type(&self) -> bool {
        match self.doc_type {
            DocType::Tiny => self.key_len == 1,
            DocType::Int | DocType::Double => self.key_len == 8,
            DocType::String => self.key_len > 0,
            DocType::Document => self.key_len == 0,
        }
    }

    pub fn full_name(&self, root: &Field) -> String {
        document::full_name(&root.name, &self.path)
    }

    pub fn check_field_name_match(&self, root: &Field, name: &str) -> bool {
        document::check_name_match(&self.full_name(root), name)
    }

    /// A missing path reads as NULL whatever the root's own nullability.
    pub fn maybe_null(&self) -> bool {
        true
    }

    pub fn result_type(&self) -> ItemResult {
        match self.doc_type {
            DocType::Tiny | DocType::Int => ItemResult::Int,
            DocType::Double => ItemResult::Real,
            DocType::String | DocType::Document => ItemResult::String,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self.doc_type {
            DocType::Tiny => KeyType::Int8,
            DocType::Int => KeyType::LongLong,
            DocType::Double => KeyType::Double,
            DocType::String | DocType::Document => KeyType::VarBinary2,
        }
    }

    // ---------------------------------------------------------------------
    // Reads

    /// The node at this path, whatever its kind.
    pub fn val_document(&self, root: &Field, row: &RowBuffer) -> Option<Value> {
        let tree = root_value(root, row)?;
        document::navigate(&tree, &self.path).cloned()
    }

    /// The node reinterpreted as the declared type; a mismatch reads as NULL.
    pub fn typed_value(&self, root: &Field, row: &RowBuffer) -> Option<Value> {
        self.val_document(root, row)
            .filter(|v| self.doc_type.accepts(NodeKind::of(v)))
    }

    pub fn is_null(&self, root: &Field, row: &RowBuffer) -> bool {
        self.typed_value(root, row).is_none()
    }

    pub fn val_int(&self, root: &Field, row: &RowBuffer) -> Option<i64> {
        let v = self.typed_value(root, row)?;
        document::leaf_i64(&v)
            .or_else(|| document::leaf_f64(&v).map(|d| d as i64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    }

    pub fn val_real(&self, root: &Field, row: &RowBuffer) -> Option<f64> {
        let v = self.typed_value(root, row)?;
        document::leaf_f64(&v)
            .or_else(|| document::leaf_i64(&v).map(|i| i as f64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    }

    /// String leaves read as their text, anything else as JSON.
    pub fn val_str(&self, root: &Field, row: &RowBuffer) -> Option<Vec<u8>> {
        let v = self.typed_value(root, row)?;
        Some(match v {
            Value::String(s) => s.into_bytes(),
            other => document::to_bytes(&other),
        })
    }

    // ---------------------------------------------------------------------
    // Index keys

    /// A standalone field able to hold the key image of this path.
    pub fn new_key_field(&self, ptr: usize, null: Option<NullBit>) -> Result<Field, FieldError> {
        self.key_field_as(self.doc_type, ptr, null)
    }

    fn key_field_as(&self, as_type: DocType, ptr: usize, null: Option<NullBit>) -> Result<Field, FieldError> {
        let (kind, length) = match as_type {
            DocType::Tiny => (
                FieldKind::Int {
                    width: IntWidth::Tiny,
                    unsigned: false,
                    zerofill: false,
                },
                4,
            ),
            DocType::Int => (
                FieldKind::Int {
                    width: IntWidth::LongLong,
                    unsigned: false,
                    zerofill: false,
                },
                20,
            ),
            DocType::Double => (
                FieldKind::Double {
                    dec: NOT_FIXED_DEC,
                    unsigned: false,
                },
                22,
            ),
            DocType::String => (
                FieldKind::Varstring {
                    charset: &charset::BINARY,
                    length_bytes: KEY_BLOB_LENGTH as u8,
                },
                self.key_len.max(1) as u32,
            ),
            DocType::Document => {
                return Err(FieldError::Argument(
                    "a key cannot be built on a whole document".to_string(),
                ))
            }
        };
        let mut field = Field::new(&self.path.to_string(), kind, length).at(ptr);
        if let Some(bit) = null {
            field = field.with_null(bit);
        }
        Ok(field)
    }

    /// Materialize the leaf as `as_type` in a scratch record bound to `key`.
    fn materialize(&self, root: &Field, row: &RowBuffer, as_type: DocType) -> Option<(Field, RowBuffer)> {
        let key = self.key_field_as(as_type, 0, None).ok()?;
        let v = self.val_document(root, row)?;
        if !as_type.accepts(NodeKind::of(&v)) {
            return None;
        }
        let mut scratch = RowBuffer::with_config(key.pack_length(), row.config().clone());
        match as_type {
            DocType::Tiny | DocType::Int => key.store_int(&mut scratch, document::leaf_i64(&v)?, false),
            DocType::Double => key.store_f64(&mut scratch, document::leaf_f64(&v)?),
            DocType::String => key.store_str(&mut scratch, document::leaf_str(&v)?.as_bytes(), &charset::BINARY),
            DocType::Document => return None,
        };
        Some((key, scratch))
    }

    /// Append the key image of the leaf; `None` (with a zeroed image) when
    /// the path is missing or holds another kind.
    pub fn get_key_image(&self, root: &Field, row: &RowBuffer, buf: &mut Vec<u8>, length: usize) -> Option<usize> {
        match self.materialize(root, row, self.doc_type) {
            Some((key, scratch)) => Some(key.get_key_image(&scratch, buf, length)),
            None => {
                let width = match self.doc_type {
                    DocType::String => KEY_BLOB_LENGTH + length,
                    _ => self.key_len.min(length),
                };
                buf.resize(buf.len() + width, 0);
                None
            }
        }
    }

    /// Write a memcmp-ordered sort key of the leaf read as `as_type`.
    pub fn make_sort_key_as_type(&self, root: &Field, row: &RowBuffer, to: &mut [u8], as_type: DocType) {
        match self.materialize(root, row, as_type) {
            Some((key, scratch)) => key.make_sort_key(&scratch, to),
            None => to.fill(0),
        }
    }

    pub fn make_sort_key(&self, root: &Field, row: &RowBuffer, to: &mut [u8]) {
        self.make_sort_key_as_type(root, row, to, self.doc_type)
    }

    // ---------------------------------------------------------------------
    // Partial update

    fn modify<F>(&self, root: &Field, row: &mut RowBuffer, op: F) -> ConversionStatus
    where
        F: FnOnce(&mut Value) -> Result<(), DocumentError>,
    {
        let mut tree = if root.is_null(row) || root.data_length(row) == 0 {
            Value::Object(Map::new())
        } else {
            let parsed = document::parse(&root.val_str(row));
            match parsed {
                Ok(v) => v,
                Err(e) => {
                    warn_invalid(root, row, &e);
                    return ConversionStatus::ErrBadValue;
                }
            }
        };
        if let Err(e) = op(&mut tree) {
            root.warn(
                row,
                WarningLevel::Warning,
                WarningCode::DocumentPath,
                format!("Cannot update {}: {}", self.full_name(root), e),
            );
            return ConversionStatus::ErrBadValue;
        }
        let bytes = document::to_bytes(&tree);
        if bytes.len() > root.max_data_length() {
            warn_too_big(root, row, bytes.len());
            return ConversionStatus::WarnOutOfRange;
        }
        debug!(column = %root.name, path = %self.path, bytes = bytes.len(), "partial document update");
        string::write_blob(root, row, bytes);
        root.set_notnull(row);
        ConversionStatus::Ok
    }

    /// Replace the node at this path, leaving the rest of the tree alone.
    pub fn store_value(&self, root: &Field, row: &mut RowBuffer, value: Value) -> ConversionStatus {
        self.modify(root, row, |tree| document::update_at(tree, &self.path, value))
    }

    /// Store JSON text as a sub-document.
    pub fn store_json(&self, root: &Field, row: &mut RowBuffer, text: &[u8]) -> ConversionStatus {
        match document::parse(text) {
            Ok(v) => self.store_value(root, row, v),
            Err(e) => {
                warn_invalid(root, row, &e);
                ConversionStatus::ErrBadValue
            }
        }
    }

    /// Store text as a string leaf.
    /// Bytes that are not valid UTF-8 are rejected for every source
    /// charset, binary included.
    pub fn store_str(&self, root: &Field, row: &mut RowBuffer, s: &[u8], _cs: &CharsetInfo) -> ConversionStatus {
        match std::str::from_utf8(s) {
            Ok(text) => self.store_value(root, row, Value::String(text.to_string())),
            Err(e) => {
                root.warn(
                    row,
                    WarningLevel::Warning,
                    WarningCode::TruncatedWrongValue,
                    format!("Invalid string value for a document path at byte {}", e.valid_up_to()),
                );
                ConversionStatus::ErrBadValue
            }
        }
    }

    pub fn store_int(&self, root: &Field, row: &mut RowBuffer, nr: i64, unsigned: bool) -> ConversionStatus {
        let n = if unsigned {
            Number::from(nr as u64)
        } else {
            Number::from(nr)
        };
        self.store_value(root, row, Value::Number(n))
    }

    pub fn store_real(&self, root: &Field, row: &mut RowBuffer, nr: f64) -> ConversionStatus {
        match Number::from_f64(nr) {
            Some(n) => self.store_value(root, row, Value::Number(n)),
            None => {
                root.warn_status(row, ConversionStatus::ErrBadValue);
                ConversionStatus::ErrBadValue
            }
        }
    }

    pub fn store_decimal(&self, root: &Field, row: &mut RowBuffer, value: &Decimal) -> ConversionStatus {
        if value.fract().is_zero() {
            if let Ok(i) = i64::try_from(*value) {
                return self.store_int(root, row, i, false);
            }
        }
        self.store_real(root, row, decimal_to_f64(value))
    }

    /// Set the node to JSON null.
    pub fn store_null(&self, root: &Field, row: &mut RowBuffer) -> ConversionStatus {
        self.store_value(root, row, Value::Null)
    }

    /// Remove the node at this path. Removing a missing node is a no-op.
    pub fn delete(&self, root: &Field, row: &mut RowBuffer) -> ConversionStatus {
        if root.is_null(row) {
            return ConversionStatus::Ok;
        }
        self.modify(root, row, |tree| document::delete_at(tree, &self.path).map(|_| ()))
    }
}
