//! Session configuration.
//!
//! Values can be set in code via the `with_*` builders or loaded from
//! environment variables (and a `.env` file, if the caller loads one with
//! `dotenvy` first), all prefixed with [`ENV_PREFIX`]:
//!
//! * `CTP_CONFIRM_POLICY` - `required` (default) or `skip`
//! * `CTP_PRODUCT_INFO` - login product info (default: `openctp`)
//! * `CTP_CONNECT_TIMEOUT_SECS` - handshake timeout (default: 30)
//! * `CTP_QUERY_TIMEOUT_SECS` - settlement query timeout (default: 60)

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Prefix of all environment variables the crate reads.
pub const ENV_PREFIX: &str = "CTP_";

const DEFAULT_PRODUCT_INFO: &str = "openctp";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Whether the session sends a settlement confirmation after login.
///
/// Brokers differ here: some reject any further request until the previous
/// statement is confirmed, others do not require it at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmPolicy {
    /// Confirm right after login, session is ready once confirmed.
    #[default]
    Required,

    /// Session is ready right after login.
    Skip,
}

/// Session parameters besides the credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    confirm_policy: ConfirmPolicy,
    product_info: String,
    connect_timeout: Duration,
    query_timeout: Duration,
}

/// Raw environment representation of [`SessionConfig`].
#[derive(Debug, Deserialize)]
struct EnvConfig {
    confirm_policy: Option<ConfirmPolicy>,
    product_info: Option<String>,
    connect_timeout_secs: Option<u64>,
    query_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirm_policy: ConfirmPolicy::default(),
            product_info: DEFAULT_PRODUCT_INFO.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from `CTP_*` environment variables,
    /// missing ones fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_config(envy::prefixed(ENV_PREFIX).from_env()?)
    }

    /// Same as [`Self::from_env`] but over explicit key-value pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefixed = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX));
        Self::from_env_config(envy::prefixed(ENV_PREFIX).from_iter(prefixed)?)
    }

    fn from_env_config(env: EnvConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(policy) = env.confirm_policy {
            config.confirm_policy = policy;
        }
        if let Some(product_info) = env.product_info {
            config.product_info = product_info;
        }
        if let Some(secs) = env.connect_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid("connect timeout", "must be positive".into()));
            }
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env.query_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid("query timeout", "must be positive".into()));
            }
            config.query_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_confirm_policy(mut self, policy: ConfirmPolicy) -> Self {
        self.confirm_policy = policy;
        self
    }

    /// Sets the product info string sent with login (default: `openctp`).
    pub fn with_product_info(mut self, product_info: impl Into<String>) -> Self {
        self.product_info = product_info.into();
        self
    }

    /// Sets how long [`crate::session::Session::connect`] waits for the
    /// handshake to finish (default: 30s).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a settlement query waits for its last chunk (default: 60s).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn confirm_policy(&self) -> ConfirmPolicy {
        self.confirm_policy
    }

    pub fn product_info(&self) -> &str {
        &self.product_info
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}
