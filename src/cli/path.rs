use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::cli::{status_label, write_json, wprintln};
use crate::field::charset;
use crate::field::doc_field::{root_value, DocType};
use crate::field::document;
use crate::field::schema::{ColumnDef, TableSchema};
use crate::field::session::FieldConfig;
use crate::field::status::{ConversionStatus, Warning};
use crate::FieldError;

/// Options for the `rowf path` subcommand.
pub struct PathOptions {
    /// Document text.
    pub doc: String,
    /// Key path.
    pub path: String,
    /// JSON value to place at the path.
    pub set: Option<String>,
    pub delete: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct PathReport {
    path: String,
    full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ConversionStatus>,
    /// Node at the path after any update; absent when the path is missing.
    value: Option<Value>,
    document: Option<Value>,
    warnings: Vec<Warning>,
}

/// Resolve a path in a document, optionally replacing or removing the node.
pub fn execute(opts: &PathOptions, writer: &mut dyn Write) -> Result<(), FieldError> {
    document::parse_root(opts.doc.as_bytes())?;

    let mut table = TableSchema::new("rowf", vec![ColumnDef::new("doc", "document")]).open(FieldConfig::default())?;
    let root = table.fields[0].clone();
    let path = table.doc_path("doc", &opts.path, DocType::Document, 0)?;
    root.set_notnull(&mut table.row);
    root.store_str(&mut table.row, opts.doc.as_bytes(), &charset::UTF8MB4_BIN);

    let status = if let Some(text) = &opts.set {
        Some(path.store_json(&root, &mut table.row, text.as_bytes()))
    } else if opts.delete {
        Some(path.delete(&root, &mut table.row))
    } else {
        None
    };

    let row = &table.row;
    let report = PathReport {
        path: path.path.to_string(),
        full_name: path.full_name(&root),
        status,
        value: path.val_document(&root, row),
        document: root_value(&root, row),
        warnings: row.session().warnings().to_vec(),
    };

    if opts.json {
        return write_json(writer, &report);
    }

    wprintln!(writer, "Path:      {}", report.full_name.bold())?;
    if let Some(status) = report.status {
        wprintln!(writer, "Status:    {}", status_label(status))?;
    }
    match &report.value {
        Some(v) => wprintln!(writer, "Value:     {}", v)?,
        None => wprintln!(writer, "Value:     {}", "(missing)".dimmed())?,
    }
    if report.status.is_some() {
        if let Some(doc) = &report.document {
            wprintln!(writer, "Document:  {}", doc)?;
        }
    }
    for w in &report.warnings {
        wprintln!(writer, "  {}", w.to_string().yellow())?;
    }
    Ok(())
}
