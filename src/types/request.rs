use super::*;
use crate::Credentials;

/// Outbound request, tagged with a [`RequestId`] when handed to the transport.
///
/// * [`Request::Authenticate`] is the client terminal authentication which has
///   to precede login on production fronts.
/// * [`Request::Login`] opens the trading session and yields the trading day.
/// * [`Request::SettlementConfirm`] acknowledges the previous day's statement;
///   some brokers refuse trading requests until it is sent.
/// * [`Request::QuerySettlement`] asks for the settlement statement text, delivered
///   as a chunked response.
#[derive(Clone, derive_more::Debug, PartialEq, Eq)]
pub enum Request {
    Authenticate {
        broker_id: String,
        user_id: String,
        app_id: String,
        #[debug(skip)]
        auth_code: String,
    },

    Login {
        broker_id: String,
        user_id: String,
        #[debug(skip)]
        password: String,
        product_info: String,
    },

    SettlementConfirm {
        broker_id: String,
        investor_id: String,
    },

    QuerySettlement {
        broker_id: String,
        investor_id: String,
        /// Statement day, the latest available statement if not set.
        trading_day: Option<TradingDay>,
    },
}

impl Request {
    pub(crate) fn authenticate(credentials: &Credentials) -> Self {
        Self::Authenticate {
            broker_id: credentials.broker_id().to_string(),
            user_id: credentials.user_id().to_string(),
            app_id: credentials.app_id().to_string(),
            auth_code: credentials.auth_code().to_string(),
        }
    }

    pub(crate) fn login(credentials: &Credentials, product_info: &str) -> Self {
        Self::Login {
            broker_id: credentials.broker_id().to_string(),
            user_id: credentials.user_id().to_string(),
            password: credentials.password().to_string(),
            product_info: product_info.to_string(),
        }
    }

    pub(crate) fn settlement_confirm(credentials: &Credentials) -> Self {
        Self::SettlementConfirm {
            broker_id: credentials.broker_id().to_string(),
            investor_id: credentials.user_id().to_string(),
        }
    }

    pub(crate) fn query_settlement(
        credentials: &Credentials,
        trading_day: Option<TradingDay>,
    ) -> Self {
        Self::QuerySettlement {
            broker_id: credentials.broker_id().to_string(),
            investor_id: credentials.user_id().to_string(),
            trading_day,
        }
    }

    /// Short request name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Authenticate { .. } => "authenticate",
            Request::Login { .. } => "login",
            Request::SettlementConfirm { .. } => "settlement_confirm",
            Request::QuerySettlement { .. } => "query_settlement",
        }
    }
}
