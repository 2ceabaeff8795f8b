use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{load_config, status_label, write_json, wprintln};
use crate::field::charset;
use crate::field::copy::set_field_to_null;
use crate::field::schema::{ColumnDef, TableSchema};
use crate::field::status::{ConversionStatus, Warning};
use crate::util::hex::{format_bytes, format_spaced};
use crate::FieldError;

/// Options for the `rowf store` subcommand.
pub struct StoreOptions {
    /// Column type string, e.g. "decimal(5,2)".
    pub column_type: String,
    /// Value text; `None` together with `null` stores NULL.
    pub value: Option<String>,
    pub null: bool,
    /// Declare the column NOT NULL.
    pub not_null: bool,
    pub collation: Option<String>,
    /// Path to a JSON field configuration.
    pub config: Option<String>,
    pub json: bool,
}

#[derive(Serialize)]
struct StoreReport {
    column_type: String,
    sql_type: String,
    status: ConversionStatus,
    is_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    val_int: i64,
    val_real: f64,
    pack_length: usize,
    record: String,
    sort_key: String,
    packed: String,
    warnings: Vec<Warning>,
}

/// Store one value into a single-column table and report every representation.
pub fn execute(opts: &StoreOptions, writer: &mut dyn Write) -> Result<(), FieldError> {
    let config = load_config(opts.config.as_deref())?;
    let mut column = ColumnDef::new("c", &opts.column_type);
    column.is_nullable = !opts.not_null;
    column.collation = opts.collation.clone();
    let mut table = TableSchema::new("rowf", vec![column]).open(config)?;
    let field = table.fields[0].clone();

    let status = if opts.null {
        set_field_to_null(&field, &mut table.row)
    } else {
        let value = opts
            .value
            .as_deref()
            .ok_or_else(|| FieldError::Argument("either --value or --null is required".to_string()))?;
        field.set_notnull(&mut table.row);
        field.store_str(&mut table.row, value.as_bytes(), &charset::UTF8MB4_BIN)
    };

    let row = &table.row;
    let is_null = field.is_null(row);
    let mut sort_key = vec![0u8; field.sort_length(row.config())];
    field.make_sort_key(row, &mut sort_key);
    let mut packed = Vec::new();
    if !is_null {
        field.pack(row, &mut packed, usize::MAX, true);
    }
    let report = StoreReport {
        column_type: opts.column_type.clone(),
        sql_type: field.sql_type(),
        status,
        is_null,
        value: (!is_null).then(|| field.val_string(row)),
        val_int: field.val_int(row),
        val_real: field.val_real(row),
        pack_length: field.pack_length(),
        record: format_bytes(table.record(0)),
        sort_key: format_bytes(&sort_key),
        packed: format_bytes(&packed),
        warnings: row.session().warnings().to_vec(),
    };

    if opts.json {
        return write_json(writer, &report);
    }

    wprintln!(writer, "Column:      {} ({})", report.sql_type.bold(), report.column_type)?;
    wprintln!(writer, "Status:      {}", status_label(status))?;
    match &report.value {
        Some(v) => wprintln!(writer, "Value:       {}", v)?,
        None => wprintln!(writer, "Value:       {}", "NULL".dimmed())?,
    }
    wprintln!(writer, "val_int:     {}", report.val_int)?;
    wprintln!(writer, "val_real:    {}", report.val_real)?;
    wprintln!(writer, "Record:      {}", format_spaced(table.record(0)))?;
    wprintln!(writer, "Sort key:    {}", format_spaced(&sort_key))?;
    wprintln!(writer, "Packed:      {}", format_spaced(&packed))?;
    if !report.warnings.is_empty() {
        wprintln!(writer)?;
        wprintln!(writer, "Warnings:")?;
        for w in &report.warnings {
            wprintln!(writer, "  {}", w.to_string().yellow())?;
        }
    }
    Ok(())
}
