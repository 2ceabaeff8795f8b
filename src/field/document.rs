//! Document key paths and tree operations.
//!
//! A document column stores a JSON tree. Columns derived from it address a
//! node inside the tree with a [`KeyPath`] such as ``addr.`zip code`[0]``.
//! The tree itself is a [`serde_json::Value`]; this module only knows how to
//! parse, walk, update and delete by path.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::FieldError;

/// One component of a key path.
///
/// A component whose text is a plain non-negative integer can also select an
/// array element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub name: String,
    pub index: Option<usize>,
}

impl DocumentKey {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let index = if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            name.parse().ok()
        } else {
            None
        };
        DocumentKey { name, index }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.name.replace('`', "``"))
    }
}

/// A dotted path into a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    keys: Vec<DocumentKey>,
}

impl KeyPath {
    pub fn new(keys: Vec<DocumentKey>) -> Self {
        KeyPath { keys }
    }

    /// Parse `a.b[1]`, `` `a.b`.c `` and friends.
    ///
    /// Segments are separated by `.`; a segment is either bare text or
    /// back-tick quoted with ```` `` ```` as an escaped back-tick. Any segment
    /// may be followed by `[n]` array selectors.
    pub fn parse(text: &str) -> Result<KeyPath, FieldError> {
        let bytes = text.as_bytes();
        let mut keys = Vec::new();
        let mut pos = 0;
        if bytes.is_empty() {
            return Ok(KeyPath::default());
        }
        loop {
            let mut name = Vec::new();
            let quoted = bytes.get(pos) == Some(&b'`');
            if quoted {
                pos += 1;
                loop {
                    match bytes.get(pos) {
                        None => {
                            return Err(FieldError::Parse(format!(
                                "unterminated quoted key in path '{}'",
                                text
                            )))
                        }
                        Some(b'`') if bytes.get(pos + 1) == Some(&b'`') => {
                            name.push(b'`');
                            pos += 2;
                        }
                        Some(b'`') => {
                            pos += 1;
                            break;
                        }
                        Some(&b) => {
                            name.push(b);
                            pos += 1;
                        }
                    }
                }
            } else {
                let start = pos;
                while pos < bytes.len() && !matches!(bytes[pos], b'.' | b'[' | b'`') {
                    pos += 1;
                }
                name.extend_from_slice(&bytes[start..pos]);
            }
            // A path may open with an array selector; any other empty key is an error.
            let leading_index = pos == 0 && bytes.first() == Some(&b'[');
            if !quoted && name.is_empty() && !leading_index {
                return Err(FieldError::Parse(format!("empty key at offset {} in path '{}'", pos, text)));
            }
            if quoted || !name.is_empty() {
                keys.push(DocumentKey::new(String::from_utf8_lossy(&name).into_owned()));
            }
            while bytes.get(pos) == Some(&b'[') {
                let start = pos + 1;
                let Some(len) = bytes[start..].iter().position(|&b| b == b']') else {
                    return Err(FieldError::Parse(format!("unterminated '[' at offset {} in path '{}'", pos, text)));
                };
                let digits = &text[start..start + len];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(FieldError::Parse(format!(
                        "bad array index '{}' at offset {} in path '{}'",
                        digits, start, text
                    )));
                }
                keys.push(DocumentKey::new(digits));
                pos = start + len + 1;
            }
            match bytes.get(pos) {
                None => break,
                Some(b'.') => pos += 1,
                Some(&b) => {
                    return Err(FieldError::Parse(format!(
                        "unexpected '{}' at offset {} in path '{}'",
                        b as char, pos, text
                    )))
                }
            }
        }
        Ok(KeyPath { keys })
    }

    pub fn keys(&self) -> &[DocumentKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// This path followed by `more`.
    pub fn join(&self, more: &KeyPath) -> KeyPath {
        let mut keys = self.keys.clone();
        keys.extend(more.keys.iter().cloned());
        KeyPath { keys }
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.keys.starts_with(&prefix.keys)
    }

    /// The path with its first `n` components removed.
    pub fn skip(&self, n: usize) -> KeyPath {
        KeyPath {
            keys: self.keys.iter().skip(n).cloned().collect(),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

/// Display name of a path column: `` `doc`.`a`.`b` ``.
pub fn full_name(field_name: &str, path: &KeyPath) -> String {
    let mut name = DocumentKey::new(field_name).to_string();
    for key in path.keys() {
        name.push('.');
        name.push_str(&key.to_string());
    }
    name
}

/// True when `short_name` names `long_name` or one of its path prefixes.
///
/// A generated path name starts with a back-tick while ordinary names do
/// not; in that case the short name must match a whole quoted component.
/// Comparison ignores ASCII case.
pub fn check_name_match(long_name: &str, short_name: &str) -> bool {
    let (long, quoted) = match long_name.strip_prefix('`') {
        Some(rest) if !short_name.starts_with('`') => (rest, true),
        _ => (long_name, false),
    };
    let (lb, sb) = (long.as_bytes(), short_name.as_bytes());
    if sb.len() > lb.len() {
        return false;
    }
    let mut next = sb.len();
    if quoted {
        if lb.get(next) != Some(&b'`') {
            return false;
        }
        next += 1;
    }
    if !matches!(lb.get(next), None | Some(b'.')) {
        return false;
    }
    lb[..sb.len()].eq_ignore_ascii_case(sb)
}

/// Kind of a tree node, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Bool,
    Int,
    Double,
    String,
    Object,
    Array,
}

impl NodeKind {
    pub fn of(value: &Value) -> NodeKind {
        match value {
            Value::Null => NodeKind::Null,
            Value::Bool(_) => NodeKind::Bool,
            Value::Number(n) if n.is_f64() => NodeKind::Double,
            Value::Number(_) => NodeKind::Int,
            Value::String(_) => NodeKind::String,
            Value::Array(_) => NodeKind::Array,
            Value::Object(_) => NodeKind::Object,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Object | NodeKind::Array)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Null => "null",
            NodeKind::Bool => "bool",
            NodeKind::Int => "int",
            NodeKind::Double => "double",
            NodeKind::String => "string",
            NodeKind::Object => "object",
            NodeKind::Array => "array",
        };
        f.write_str(s)
    }
}

/// Structural failures of document operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("invalid document at offset {offset}: {message}")]
    Invalid { offset: usize, message: String },

    #[error("document root must be an object or array, found {found}")]
    RootNotContainer { found: NodeKind },

    #[error("path component {index} ({key}) is blocked by a {found}")]
    NotContainer {
        index: usize,
        key: String,
        found: NodeKind,
    },

    #[error("path component {index} ({key}) is not an index into an array")]
    NotAnIndex { index: usize, key: String },

    #[error("path component {index} ({key}) does not exist")]
    Missing { index: usize, key: String },

    #[error("the document root cannot be deleted")]
    DeleteRoot,
}

impl From<DocumentError> for FieldError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Invalid { offset, message } => FieldError::Document { offset, message },
            other => FieldError::Document {
                offset: 0,
                message: other.to_string(),
            },
        }
    }
}

fn byte_offset(text: &[u8], line: usize, column: usize) -> usize {
    let mut offset = 0;
    for _ in 1..line {
        match text[offset..].iter().position(|&b| b == b'\n') {
            Some(p) => offset += p + 1,
            None => return text.len(),
        }
    }
    (offset + column.saturating_sub(1)).min(text.len())
}

/// Parse a document payload.
pub fn parse(text: &[u8]) -> Result<Value, DocumentError> {
    serde_json::from_slice(text).map_err(|e| DocumentError::Invalid {
        offset: byte_offset(text, e.line(), e.column()),
        message: e.to_string(),
    })
}

/// Parse a payload destined for a document column: the root must be a
/// container.
pub fn parse_root(text: &[u8]) -> Result<Value, DocumentError> {
    let value = parse(text)?;
    let found = NodeKind::of(&value);
    if !found.is_container() {
        return Err(DocumentError::RootNotContainer { found });
    }
    Ok(value)
}

/// Canonical serialized form.
pub fn to_bytes(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

fn step<'a>(node: &'a Value, key: &DocumentKey) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(&key.name),
        Value::Array(items) => key.index.and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Walk `path` from `root`. A missing component yields `None`.
pub fn navigate<'a>(root: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    path.keys().iter().try_fold(root, step)
}

fn step_mut<'a>(node: &'a mut Value, key: &DocumentKey, index: usize) -> Result<&'a mut Value, DocumentError> {
    let found = NodeKind::of(node);
    match node {
        Value::Object(map) => map.get_mut(&key.name).ok_or_else(|| DocumentError::Missing {
            index,
            key: key.name.clone(),
        }),
        Value::Array(items) => {
            let i = key.index.ok_or_else(|| DocumentError::NotAnIndex {
                index,
                key: key.name.clone(),
            })?;
            items.get_mut(i).ok_or_else(|| DocumentError::Missing {
                index,
                key: key.name.clone(),
            })
        }
        _ => Err(DocumentError::NotContainer {
            index,
            key: key.name.clone(),
            found,
        }),
    }
}

/// Locate the parent of the last component of a non-empty `path`.
fn parent_mut<'a>(root: &'a mut Value, path: &KeyPath) -> Result<&'a mut Value, DocumentError> {
    let keys = path.keys();
    let mut node = root;
    for (i, key) in keys[..keys.len() - 1].iter().enumerate() {
        node = step_mut(node, key, i)?;
    }
    Ok(node)
}

/// Replace the node at `path` with `value`, leaving every other node alone.
///
/// The last component may name a new object member or the slot one past the
/// end of an array; intermediate components must already exist and be
/// containers.
pub fn update_at(root: &mut Value, path: &KeyPath, value: Value) -> Result<(), DocumentError> {
    let Some(last) = path.keys().last() else {
        let found = NodeKind::of(&value);
        if !found.is_container() {
            return Err(DocumentError::RootNotContainer { found });
        }
        *root = value;
        return Ok(());
    };
    let index = path.len() - 1;
    let parent = parent_mut(root, path)?;
    let found = NodeKind::of(parent);
    match parent {
        Value::Object(map) => {
            map.insert(last.name.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let i = last.index.ok_or_else(|| DocumentError::NotAnIndex {
                index,
                key: last.name.clone(),
            })?;
            if i < items.len() {
                items[i] = value;
            } else if i == items.len() {
                items.push(value);
            } else {
                return Err(DocumentError::Missing {
                    index,
                    key: last.name.clone(),
                });
            }
            Ok(())
        }
        _ => Err(DocumentError::NotContainer {
            index,
            key: last.name.clone(),
            found,
        }),
    }
}

/// Remove the node at `path`, returning it. A missing node is not an error.
pub fn delete_at(root: &mut Value, path: &KeyPath) -> Result<Option<Value>, DocumentError> {
    let Some(last) = path.keys().last() else {
        return Err(DocumentError::DeleteRoot);
    };
    let parent = match parent_mut(root, path) {
        Ok(p) => p,
        Err(DocumentError::Missing { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(match parent {
        Value::Object(map) => map.remove(&last.name),
        Value::Array(items) => match last.index {
            Some(i) if i < items.len() => Some(items.remove(i)),
            _ => None,
        },
        _ => None,
    })
}

/// Integer view of a leaf: integers and booleans.
pub fn leaf_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(*b as i64),
        Value::Number(n) => n.as_i64().or_else(|| n.as_u64().map(|u| u as i64)),
        _ => None,
    }
}

/// Floating-point view of a numeric leaf.
pub fn leaf_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// String view of a string leaf.
pub fn leaf_str(value: &Value) -> Option<&str> {
    value.as_str()
}
