//! Typed column values over MySQL-style row buffers.
//!
//! The `rowfield-utils` crate (library name `rowfield`) models the column
//! layer of a relational storage engine: each column type knows how to store
//! text, integers, reals, decimals and temporal values into its record bytes,
//! read them back in every representation, compare and build sort keys, and
//! pack or unpack itself for row-based replication.
//!
//! # CLI Reference
//!
//! The `rowf` binary exercises the library from the command line.
//!
//! | Command | Purpose |
//! |---------|---------|
//! | [`rowf store`](cli::app::Commands::Store) | Store one value into a column of a given type and show every representation |
//! | [`rowf decode`](cli::app::Commands::Decode) | Decode a hex record image against a table schema |
//! | [`rowf path`](cli::app::Commands::Path) | Resolve or partially update a document path |
//!
//! All subcommands accept `--color <auto|always|never>`, `--output <file>`
//! and `-v` (repeat for more tracing output).
//!
//! # Library API
//!
//! ```
//! use rowfield::field::charset::LATIN1_SWEDISH_CI;
//! use rowfield::field::schema::{ColumnDef, TableSchema};
//! use rowfield::field::session::FieldConfig;
//! use rowfield::field::status::ConversionStatus;
//!
//! let mut table = TableSchema::new(
//!     "t1",
//!     vec![ColumnDef::new("price", "decimal(5,2)"), ColumnDef::new("name", "char(4)")],
//! )
//! .open(FieldConfig::default())
//! .unwrap();
//!
//! let price = table.fields[0].clone();
//! price.set_notnull(&mut table.row);
//! assert_eq!(price.store_str(&mut table.row, b"3.14159", &LATIN1_SWEDISH_CI), ConversionStatus::NoteTruncated);
//! assert_eq!(price.val_string(&table.row), "3.14");
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`field::base`] | `Field`: identity, sizes, null handling, store/read/compare dispatch |
//! | [`field::numeric`] | Integer, float, double and decimal columns |
//! | [`field::string`] | CHAR, VARCHAR, BLOB, ENUM and SET columns |
//! | [`field::temporal`] | YEAR, DATE, TIME, DATETIME and TIMESTAMP columns |
//! | [`field::bit`] | BIT(N) columns |
//! | [`field::doc_field`] | Document columns and typed path columns |
//! | [`field::copy`] | Value conversion between columns and bulk copy strategies |
//! | [`field::schema`] | Table definitions and record layout |
//! | [`field::replication`] | Table maps and row images |
//! | [`field::row`] | Record buffers, null bits, blob arena |
//! | [`field::session`] | Configuration, warning collection, clock |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `rowf` binary (`clap`, `colored`, `tracing-subscriber`). |

#[cfg(feature = "cli")]
pub mod cli;
pub mod field;
pub mod util;

use thiserror::Error;

/// Errors returned by `rowfield` operations.
///
/// Value conversions report a [`ConversionStatus`](field::status::ConversionStatus)
/// instead; this type covers everything else.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// An I/O error occurred (file open, read or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A parse error occurred (malformed type string, config or wire image).
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid argument was supplied (bad column definition, unknown name, etc.).
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// A document value could not be parsed or modified.
    #[error("Invalid document at offset {offset}: {message}")]
    Document { offset: usize, message: String },
}
