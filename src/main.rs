#[cfg(not(feature = "cli"))]
compile_error!("The `rowf` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use rowfield::cli;
use rowfield::cli::app::{Cli, ColorMode, Commands};
use rowfield::FieldError;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, FieldError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| FieldError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Store {
            column_type,
            value,
            null,
            not_null,
            collation,
            config,
            json,
        } => cli::store::execute(
            &cli::store::StoreOptions {
                column_type,
                value,
                null,
                not_null,
                collation,
                config,
                json,
            },
            &mut writer,
        ),

        Commands::Decode {
            schema,
            row,
            config,
            json,
        } => cli::decode::execute(
            &cli::decode::DecodeOptions {
                schema,
                row,
                config,
                json,
            },
            &mut writer,
        ),

        Commands::Path {
            doc,
            path,
            set,
            delete,
            json,
        } => cli::path::execute(
            &cli::path::PathOptions {
                doc,
                path,
                set,
                delete,
                json,
            },
            &mut writer,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
