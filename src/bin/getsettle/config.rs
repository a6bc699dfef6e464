//! Command line configuration.
//!
//! Session parameters and credentials are not taken from the command line,
//! they come from `CTP_*` environment variables (see [`ctp_settle::config`]).

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use ctp_settle::report::{ReportParser, RowErrorPolicy};

#[derive(Debug, Parser)]
#[command(name = "getsettle")]
#[command(about = "CTP settlement statement tools")]
pub struct CliConfig {
    /// More log output, repeat for trace level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a saved settlement statement
    Parse(ParseArgs),

    /// Print the session configuration loaded from the environment,
    /// secrets redacted
    Config,
}

#[derive(Debug, clap::Args)]
pub struct ParseArgs {
    /// Statement file, stdin if omitted or `-`
    pub input: Option<PathBuf>,

    #[arg(long, short, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Only recognize section titles at the start of a line
    #[arg(long)]
    pub anchored_titles: bool,

    /// Collect malformed rows as diagnostics instead of failing
    #[arg(long)]
    pub skip_bad_rows: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Statement text as read
    Raw,

    /// Section line ranges
    Sections,

    /// Parsed report
    Json,
}

impl CliConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

impl ParseArgs {
    /// Input path, `None` for stdin.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }

    pub fn parser(&self) -> ReportParser {
        let policy = if self.skip_bad_rows {
            RowErrorPolicy::Skip
        } else {
            RowErrorPolicy::Raise
        };
        ReportParser::new()
            .with_anchored_titles(self.anchored_titles)
            .with_row_error_policy(policy)
    }
}
