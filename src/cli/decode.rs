use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{load_config, write_json, wprintln};
use crate::field::base::FieldKind;
use crate::field::schema::TableSchema;
use crate::util::hex::{format_bytes, hex_dump, parse_hex};
use crate::FieldError;

/// Options for the `rowf decode` subcommand.
pub struct DecodeOptions {
    /// Path to a JSON table schema.
    pub schema: String,
    /// Record image as hex.
    pub row: String,
    pub config: Option<String>,
    pub json: bool,
}

#[derive(Serialize)]
struct ColumnReport {
    name: String,
    sql_type: String,
    offset: usize,
    length: usize,
    bytes: String,
    is_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Serialize)]
struct DecodeReport {
    table: String,
    reclength: usize,
    null_bytes: usize,
    columns: Vec<ColumnReport>,
}

/// Decode a record image against a table schema.
///
/// BLOB, TEXT and document columns keep their payload out of line, so only
/// their stored length is shown.
pub fn execute(opts: &DecodeOptions, writer: &mut dyn Write) -> Result<(), FieldError> {
    let config = load_config(opts.config.as_deref())?;
    let mut table = TableSchema::load(&opts.schema)?.open(config)?;
    let image = parse_hex(&opts.row)?;
    if image.len() != table.reclength {
        return Err(FieldError::Argument(format!(
            "record image is {} bytes, table '{}' records are {} bytes",
            image.len(),
            table.name,
            table.reclength
        )));
    }
    table.row.slice_mut(0, table.reclength).copy_from_slice(&image);

    let row = &table.row;
    let columns = table
        .fields
        .iter()
        .map(|f| {
            let is_null = f.is_null(row);
            let length = f.pack_length_in_rec();
            let value = if is_null {
                None
            } else if matches!(f.kind, FieldKind::Blob { .. } | FieldKind::Document) {
                Some(format!("({} bytes out of line)", f.data_length(row)))
            } else {
                Some(f.val_string(row))
            };
            ColumnReport {
                name: f.name.clone(),
                sql_type: f.sql_type(),
                offset: f.ptr,
                length,
                bytes: format_bytes(row.slice(f.ptr, length)),
                is_null,
                value,
            }
        })
        .collect();
    let report = DecodeReport {
        table: table.name.clone(),
        reclength: table.reclength,
        null_bytes: table.null_bytes,
        columns,
    };

    if opts.json {
        return write_json(writer, &report);
    }

    wprintln!(
        writer,
        "Table {} ({} bytes per record, {} null bitmap bytes)",
        report.table.bold(),
        report.reclength,
        report.null_bytes
    )?;
    wprintln!(writer)?;
    wprintln!(writer, "{}", hex_dump(&image, 0))?;
    wprintln!(writer)?;
    wprintln!(writer, "{:<16} {:<24} {:>6} {:>6}  {}", "Column", "Type", "Offset", "Length", "Value")?;
    for c in &report.columns {
        let value = match &c.value {
            Some(v) => v.normal(),
            None => "NULL".dimmed(),
        };
        wprintln!(
            writer,
            "{:<16} {:<24} {:>6} {:>6}  {}",
            c.name,
            c.sql_type,
            c.offset,
            c.length,
            value
        )?;
    }
    Ok(())
}
