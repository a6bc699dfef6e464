//! Error types for the getsettle binary.

use ctp_settle::error::{ConfigError, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read statement: {0}")]
    Io(#[from] std::io::Error),

    #[error("Statement parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
