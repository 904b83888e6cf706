//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "recmap",
    version,
    about = "Map tabular, free-text and XML sources to typed records",
    long_about = "Map source files to klass-tagged records using YAML mapping definitions.\n\n\
                  Tabular (delimited), non-tabular (free text) and XML sources are\n\
                  supported. Records are written to stdout as JSON lines."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Transform one input file and print its records as JSON lines.
    Transform(TransformArgs),

    /// Validate a mapping document and summarise its tables.
    Check(MappingArgs),
}

#[derive(Args)]
pub struct MappingArgs {
    /// Mapping document (YAML list of table definitions).
    #[arg(long = "mapping", value_name = "FILE")]
    pub mapping: PathBuf,

    /// Standard mappings referenced by `standard_mapping` columns.
    #[arg(long = "standard-mappings", value_name = "FILE")]
    pub standard_mappings: Option<PathBuf>,
}

#[derive(Args)]
pub struct TransformArgs {
    #[command(flatten)]
    pub mapping: MappingArgs,

    /// Table name matched against `tablename_pattern` (e.g. a worksheet).
    #[arg(long = "tablename", value_name = "NAME")]
    pub tablename: Option<String>,

    /// Source file; its name selects the table definition.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
