//! Settlement statement tool.
//!
//! `getsettle parse` turns a saved statement into sections or JSON records,
//! `getsettle config` shows what a session would be configured with.
//! Logs go to stderr, output to stdout.

mod config;
mod error;

use std::{
    io::{self, Read, Write},
    process::exit,
};

use clap::Parser;
use ctp_settle::{Credentials, config::SessionConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{CliConfig, Command, OutputFormat, ParseArgs};
use error::Result;

fn main() {
    let cli = CliConfig::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        // Only matters for the config command, parsing runs without
        info!(%e, "no .env file loaded");
    }

    let result = match &cli.command {
        Command::Parse(args) => parse(args),
        Command::Config => show_config(),
    };
    if let Err(e) = result {
        error!(%e, "getsettle failed");
        exit(1);
    }
}

fn parse(args: &ParseArgs) -> Result<()> {
    let bytes = match args.input_path() {
        Some(path) => {
            info!(path = %path.display(), "reading statement");
            std::fs::read(path)?
        }
        None => {
            info!("reading statement from stdin");
            let mut buf = vec![];
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("statement is not valid UTF-8, invalid bytes replaced");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    let parser = args.parser();
    let mut out = io::stdout().lock();
    match args.output {
        OutputFormat::Raw => out.write_all(text.as_bytes())?,
        OutputFormat::Sections => {
            let (_, sections) = parser.split(&text);
            for section in sections.iter() {
                writeln!(out, "{}\t{}\t{}", section.kind, section.start, section.end)?;
            }
        }
        OutputFormat::Json => {
            let report = parser.parse(&text)?;
            info!(
                transactions = report.transactions.len(),
                closed_positions = report.closed_positions.len(),
                position_details = report.position_details.len(),
                position_summaries = report.position_summaries.len(),
                diagnostics = report.diagnostics.len(),
                "statement parsed"
            );
            for diagnostic in &report.diagnostics {
                warn!(%diagnostic, "skipped");
            }
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn show_config() -> Result<()> {
    let session = SessionConfig::from_env()?;
    let credentials = Credentials::from_env()?;
    let mut out = io::stdout().lock();
    writeln!(out, "{credentials:#?}")?;
    writeln!(out, "{session:#?}")?;
    Ok(())
}
