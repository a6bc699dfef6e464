//! Handshake state machine.

use tracing::{debug, info, warn};

use crate::{
    Credentials,
    config::ConfirmPolicy,
    error::{HandshakeError, HandshakeStage},
    types::{Request, Response, ResponseBody, TradingDay, TransportEvent},
};

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not connected to the front yet, or connection lost.
    #[default]
    Disconnected,

    /// Front connected, handshake not started.
    Connected,

    /// Authentication request sent, awaiting response.
    Authenticating,

    Authenticated,

    /// Login request sent, awaiting response.
    LoggingIn,

    LoggedIn,

    /// Settlement confirmation sent, awaiting response.
    Confirming,

    /// Handshake complete, queries can be issued.
    Ready,

    /// Broker rejected one of the handshake requests. Terminal.
    Failed,
}

impl SessionState {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Handshake is finished one way or another.
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// Drives connect → authenticate → login → (confirm) → ready.
///
/// Pure logic: consumes transport events and returns the request to send
/// next, if any. Sending is left to the caller.
#[derive(Debug)]
pub struct Handshake {
    credentials: Credentials,
    confirm_policy: ConfirmPolicy,
    product_info: String,
    state: SessionState,
    started: bool,
    trading_day: Option<TradingDay>,
    disconnect_reason: Option<i32>,
    failure: Option<HandshakeError>,
}

impl Handshake {
    pub fn new(credentials: Credentials, confirm_policy: ConfirmPolicy, product_info: &str) -> Self {
        Self {
            credentials,
            confirm_policy,
            product_info: product_info.to_string(),
            state: SessionState::Disconnected,
            started: false,
            trading_day: None,
            disconnect_reason: None,
            failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Trading day reported on login.
    pub fn trading_day(&self) -> Option<&TradingDay> {
        self.trading_day.as_ref()
    }

    /// Reason code of the most recent disconnect.
    pub fn disconnect_reason(&self) -> Option<i32> {
        self.disconnect_reason
    }

    /// Rejection that moved the session to [`SessionState::Failed`].
    pub fn failure(&self) -> Option<&HandshakeError> {
        self.failure.as_ref()
    }

    /// Applies a transport event.
    ///
    /// # Returns
    ///
    /// On success, the handshake request to send next, if the event advanced
    /// the handshake to a step that requires one.
    ///
    /// On failure, the broker rejection; the state is [`SessionState::Failed`]
    /// from then on and all further events are ignored.
    pub fn on_event(&mut self, event: &TransportEvent) -> Result<Option<Request>, HandshakeError> {
        if self.state.is_failed() {
            debug!(?event, "session failed, event ignored");
            return Ok(None);
        }
        match event {
            TransportEvent::Connected => Ok(self.on_connected()),
            TransportEvent::Disconnected { reason } => {
                self.on_disconnected(*reason);
                Ok(None)
            }
            TransportEvent::Response(rsp) => self.on_response(rsp),
        }
    }

    /// Moves to [`SessionState::Failed`] without a broker rejection, e.g.
    /// when a handshake request could not be handed to the transport.
    pub fn abort(&mut self) {
        self.transition(SessionState::Failed);
    }

    fn on_connected(&mut self) -> Option<Request> {
        if self.started {
            // The transport reconnects on its own; one handshake per session
            warn!(state = ?self.state, "front reconnected, handshake is not restarted");
            return None;
        }
        self.started = true;
        self.transition(SessionState::Connected);
        self.transition(SessionState::Authenticating);
        Some(Request::authenticate(&self.credentials))
    }

    fn on_disconnected(&mut self, reason: i32) {
        warn!(reason, state = ?self.state, "front disconnected");
        self.disconnect_reason = Some(reason);
        self.transition(SessionState::Disconnected);
    }

    fn on_response(&mut self, rsp: &Response) -> Result<Option<Request>, HandshakeError> {
        let stage = match rsp.body() {
            ResponseBody::Authenticate => HandshakeStage::Authenticate,
            ResponseBody::Login { .. } => HandshakeStage::Login,
            ResponseBody::SettlementConfirm => HandshakeStage::SettlementConfirm,
            ResponseBody::SettlementInfo { .. } => return Ok(None),
        };
        let expected = match stage {
            HandshakeStage::Authenticate => SessionState::Authenticating,
            HandshakeStage::Login => SessionState::LoggingIn,
            HandshakeStage::SettlementConfirm => SessionState::Confirming,
        };
        if self.state != expected {
            warn!(?stage, state = ?self.state, request_id = rsp.request_id(), "unexpected handshake response ignored");
            return Ok(None);
        }

        if let Some(info) = rsp.error() {
            let err = HandshakeError::new(stage, info);
            warn!(?stage, code = info.error_id, message = %info.error_msg, "handshake rejected");
            self.failure = Some(err.clone());
            self.transition(SessionState::Failed);
            return Err(err);
        }

        match rsp.body() {
            ResponseBody::Authenticate => {
                self.transition(SessionState::Authenticated);
                self.transition(SessionState::LoggingIn);
                Ok(Some(Request::login(&self.credentials, &self.product_info)))
            }
            ResponseBody::Login { trading_day } => {
                self.trading_day = trading_day.clone();
                info!(trading_day = ?self.trading_day, "logged in");
                self.transition(SessionState::LoggedIn);
                match self.confirm_policy {
                    ConfirmPolicy::Required => {
                        self.transition(SessionState::Confirming);
                        Ok(Some(Request::settlement_confirm(&self.credentials)))
                    }
                    ConfirmPolicy::Skip => {
                        self.transition(SessionState::Ready);
                        Ok(None)
                    }
                }
            }
            ResponseBody::SettlementConfirm => {
                self.transition(SessionState::Ready);
                Ok(None)
            }
            ResponseBody::SettlementInfo { .. } => Ok(None),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}
