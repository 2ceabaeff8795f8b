//! CLI subcommand implementations for the `rowf` binary.
//!
//! CLI argument parsing uses clap derive macros, with the top-level
//! [`app::Cli`] struct and [`app::Commands`] enum defined in [`app`] and
//! shared between `main.rs` and `build.rs` (for man page generation) via
//! `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct
//! holding the parsed arguments and a
//! `pub fn execute(opts, writer) -> Result<(), FieldError>` entry point. The
//! `writer: &mut dyn Write` parameter allows output to be captured in tests
//! or redirected to a file via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `rowf store` | [`store`] | Store one value and show status, warnings, record bytes, sort key and wire image |
//! | `rowf decode` | [`decode`] | Decode a hex record image column by column |
//! | `rowf path` | [`path`] | Resolve, replace or delete a node inside a document |
//!
//! Every subcommand supports `--json` for structured output via
//! `#[derive(Serialize)]` report structs and `serde_json`. The `wprintln!`
//! macro wraps `writeln!` to convert `io::Error` into `FieldError`.

pub mod app;
pub mod decode;
pub mod path;
pub mod store;

/// Write a line to the given writer, converting io::Error to FieldError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::FieldError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::FieldError::Io(e.to_string()))
    };
}

pub(crate) use wprintln;

use colored::{ColoredString, Colorize};

use crate::field::session::FieldConfig;
use crate::field::status::ConversionStatus;
use crate::FieldError;

/// Load the `--config` file, or the defaults when none was given.
pub(crate) fn load_config(path: Option<&str>) -> Result<FieldConfig, FieldError> {
    match path {
        Some(p) => FieldConfig::load(p),
        None => Ok(FieldConfig::default()),
    }
}

/// Status name colored by severity.
pub(crate) fn status_label(status: ConversionStatus) -> ColoredString {
    let name = status.name();
    if status.is_ok() {
        name.green()
    } else if status.is_error() {
        name.red()
    } else {
        name.yellow()
    }
}

/// Write a JSON report followed by a newline.
pub(crate) fn write_json<T: serde::Serialize>(writer: &mut dyn std::io::Write, report: &T) -> Result<(), FieldError> {
    use std::io::Write as _;
    let text = serde_json::to_string_pretty(report)
        .map_err(|e| FieldError::Parse(format!("JSON serialization error: {}", e)))?;
    wprintln!(writer, "{}", text)
}
