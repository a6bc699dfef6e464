use std::time::Duration;

use crate::{
    report::SectionKind,
    session::SessionState,
    types::{ErrorId, RspInfo},
};

/// Handshake step a broker rejection happened at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeStage {
    Authenticate,
    Login,
    SettlementConfirm,
}

/// Broker rejection of a handshake request. Terminal for the session.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{stage:?} rejected by broker, error {code}: {message}")]
pub struct HandshakeError {
    pub stage: HandshakeStage,
    pub code: ErrorId,
    pub message: String,
}

impl HandshakeError {
    pub(crate) fn new(stage: HandshakeStage, info: &RspInfo) -> Self {
        Self {
            stage,
            code: info.error_id,
            message: info.error_msg.clone(),
        }
    }
}

/// Error returned by the [`crate::transport::Transport`] implementation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Request was not accepted for sending, with the transport's return code.
    #[error("request rejected by transport, code {0}")]
    Rejected(i32),

    #[error("transport is not initialized")]
    NotInitialized,

    #[error("transport error: {0}")]
    Other(String),
}

/// Session-level error surfaced by [`crate::session::Session`] calls.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SessionError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("disconnected from front, reason {reason}")]
    Disconnected { reason: i32 },

    #[error("session is not ready, current state: {0:?}")]
    NotReady(SessionState),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("session actor stopped")]
    Closed,

    #[error("statement parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Settlement statement parsing error, localized to a section and a line.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Table row does not have the expected shape.
    #[error("malformed row in {section}: {reason}, line: {line:?}")]
    MalformedRow {
        section: SectionKind,
        line: String,
        reason: String,
    },

    /// Numeric cell or value could not be converted.
    #[error("invalid number {value:?} for {field} in {section}, line: {line:?}")]
    InvalidNumber {
        section: SectionKind,
        field: &'static str,
        value: String,
        line: String,
    },

    /// Mandatory key-value pattern never matched within the section.
    #[error("{pattern} not found in {section}")]
    PatternNotFound {
        section: SectionKind,
        pattern: &'static str,
    },
}

impl ParseError {
    /// Section the error originates from.
    pub fn section(&self) -> SectionKind {
        match self {
            ParseError::MalformedRow { section, .. }
            | ParseError::InvalidNumber { section, .. }
            | ParseError::PatternNotFound { section, .. } => *section,
        }
    }
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment configuration error: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid {0}: {1}")]
    Invalid(&'static str, String),
}
