//! CTP settlement statement SDK.
//!
//! # Overview
//!
//! Sequential client over the callback-driven CTP trader front, covering only
//! what is needed to pull the daily settlement statement, plus a parser for the
//! statement's fixed text layout.
//!
//! Use [`session::Session`] to run the authenticate → login → settlement confirm
//! handshake over a [`transport::Transport`] implementation, then
//! [`session::Session::query_settlement`] to fetch the raw statement text, or
//! [`session::Session::fetch_report`] to get it parsed into a
//! [`report::SettlementReport`].
//!
//! [`report::ReportParser`] can be used standalone on statements saved to disk.
//!
//! # Limitations/follow-ups
//!
//! * No concrete transport ships with the crate; the vendor trader API is
//!   expected to be bridged by implementing [`transport::Transport`].
//!
//! * Statement text is handled as UTF-8; brokers emitting GBK have to be
//!   transcoded by the transport before chunks are handed over.
//!
//! * Order entry and market data are out of scope.
//!
//! # Testing
//!
//! [`testing`] module provides [`testing::MockBroker`], an in-process scripted
//! transport answering handshake requests and settlement queries.

pub mod config;
pub mod error;
pub mod report;
pub mod session;
pub mod testing;
pub mod transport;
pub mod types;

use crate::error::ConfigError;

/// Account credentials the session authenticates and logs in with.
#[derive(Clone, derive_more::Debug, PartialEq, Eq, serde::Deserialize)]
pub struct Credentials {
    broker_id: String,
    user_id: String,
    #[debug(skip)]
    password: String,
    app_id: String,
    #[debug(skip)]
    auth_code: String,
}

impl Credentials {
    pub fn new(
        broker_id: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
        app_id: impl Into<String>,
        auth_code: impl Into<String>,
    ) -> Self {
        Self {
            broker_id: broker_id.into(),
            user_id: user_id.into(),
            password: password.into(),
            app_id: app_id.into(),
            auth_code: auth_code.into(),
        }
    }

    /// Reads `CTP_BROKER_ID`, `CTP_USER_ID`, `CTP_PASSWORD`, `CTP_APP_ID`
    /// and `CTP_AUTH_CODE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed(config::ENV_PREFIX).from_env()?)
    }

    pub fn broker_id(&self) -> &str {
        &self.broker_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn auth_code(&self) -> &str {
        &self.auth_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials::new("9999", "203199", "s3cret", "client_test", "0000111122223333");
        let debug = format!("{creds:?}");
        assert!(debug.contains("9999"));
        assert!(debug.contains("203199"));
        assert!(debug.contains("client_test"));
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("0000111122223333"));
    }

    #[test]
    fn test_credentials_from_env_vars() {
        let vars = [
            ("CTP_BROKER_ID", "9999"),
            ("CTP_USER_ID", "203199"),
            ("CTP_PASSWORD", "pw"),
            ("CTP_APP_ID", "app"),
            ("CTP_AUTH_CODE", "code"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()));
        let creds: Credentials = envy::prefixed(config::ENV_PREFIX).from_iter(vars).unwrap();
        assert_eq!(creds, Credentials::new("9999", "203199", "pw", "app", "code"));
    }
}
