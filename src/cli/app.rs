use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "rowf")]
#[command(about = "Column value toolkit for MySQL-style row buffers")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a value into a column and show how it is represented
    Store {
        /// Column type, e.g. "decimal(5,2)" or "varchar(10)"
        #[arg(short = 't', long = "type")]
        column_type: String,

        /// Value text to store (omit with --null)
        #[arg(long, conflicts_with = "null")]
        value: Option<String>,

        /// Store NULL instead of a value
        #[arg(long)]
        null: bool,

        /// Declare the column NOT NULL
        #[arg(long = "not-null")]
        not_null: bool,

        /// Collation of the column (default: latin1_swedish_ci)
        #[arg(long)]
        collation: Option<String>,

        /// Path to a JSON field configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Decode a record image against a table schema
    Decode {
        /// Path to a JSON table schema
        #[arg(short, long)]
        schema: String,

        /// Record image as hex (whitespace ignored)
        #[arg(short, long)]
        row: String,

        /// Path to a JSON field configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Resolve or update a path inside a document
    Path {
        /// Document text (an object or array)
        #[arg(short, long)]
        doc: String,

        /// Key path, e.g. "a.b[1]"
        #[arg(short, long)]
        path: String,

        /// Replace the node at the path with this JSON value
        #[arg(long, conflicts_with = "delete")]
        set: Option<String>,

        /// Remove the node at the path
        #[arg(long)]
        delete: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}
