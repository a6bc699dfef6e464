//! In-process broker for tests.
//!
//! [`MockBroker`] implements [`Transport`] by answering every request right
//! away through the event sink, following a script set up with its `with_*`
//! builders: error codes per handshake step, the trading day reported on
//! login, and the chunks a settlement query is answered with.
//!
//! [`MockBrokerHandle`] stays with the test after the broker is moved into a
//! [`crate::session::Session`], to inspect sent requests and to inject
//! events such as disconnects or late chunks.
//!
//! ```ignore
//! let broker = MockBroker::new()
//!     .with_trading_day("20230215")
//!     .with_settlement(["AA", "BB", ""]);
//! let handle = broker.handle();
//!
//! let session = Session::new(credentials(), broker, SessionConfig::default());
//! session.connect().await?;
//! assert_eq!(session.query_settlement(None).await?.text, "AABB");
//! assert_eq!(handle.requests().len(), 4);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{
    error::TransportError,
    transport::{EventSink, Transport},
    types::{Request, RequestId, Response, ResponseBody, RspInfo, TradingDay, TransportEvent},
};

/// Scripted transport answering handshake requests and settlement queries.
#[derive(Debug)]
pub struct MockBroker {
    connect_on_init: bool,
    init_error: Option<TransportError>,
    auth_error: Option<RspInfo>,
    login_error: Option<RspInfo>,
    confirm_error: Option<RspInfo>,
    trading_day: Option<TradingDay>,
    settlement: Vec<String>,
    settlement_error: Option<RspInfo>,
    answer_handshake: bool,
    answer_queries: bool,
    reject_queries: Option<i32>,
    shared: Arc<Mutex<Shared>>,
}

#[derive(Debug, Default)]
struct Shared {
    sink: Option<EventSink>,
    requests: Vec<(RequestId, Request)>,
}

/// Test-side view of a [`MockBroker`].
#[derive(Clone, Debug)]
pub struct MockBrokerHandle {
    shared: Arc<Mutex<Shared>>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self {
            connect_on_init: true,
            init_error: None,
            auth_error: None,
            login_error: None,
            confirm_error: None,
            trading_day: None,
            settlement: vec![],
            settlement_error: None,
            answer_handshake: true,
            answer_queries: true,
            reject_queries: None,
            shared: Arc::default(),
        }
    }
}

impl MockBroker {
    /// Broker accepting every request, reporting no trading day and answering
    /// queries with an empty statement.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MockBrokerHandle {
        MockBrokerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Whether `init` reports the front as connected right away (default: true).
    /// If not, the test connects it through [`MockBrokerHandle::connect`].
    pub fn with_connect_on_init(mut self, connect: bool) -> Self {
        self.connect_on_init = connect;
        self
    }

    /// Makes `init` fail.
    pub fn with_init_error(mut self, err: TransportError) -> Self {
        self.init_error = Some(err);
        self
    }

    pub fn with_auth_error(mut self, code: i32, msg: &str) -> Self {
        self.auth_error = Some(RspInfo::new(code, msg));
        self
    }

    pub fn with_login_error(mut self, code: i32, msg: &str) -> Self {
        self.login_error = Some(RspInfo::new(code, msg));
        self
    }

    pub fn with_confirm_error(mut self, code: i32, msg: &str) -> Self {
        self.confirm_error = Some(RspInfo::new(code, msg));
        self
    }

    /// Trading day reported on login. Invalid values are reported as absent.
    pub fn with_trading_day(mut self, day: &str) -> Self {
        self.trading_day = TradingDay::parse(day);
        self
    }

    /// Chunks a settlement query is answered with, the last one flagged last.
    pub fn with_settlement<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settlement = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches a broker error to the last settlement chunk.
    pub fn with_settlement_error(mut self, code: i32, msg: &str) -> Self {
        self.settlement_error = Some(RspInfo::new(code, msg));
        self
    }

    /// Accepts handshake requests but never answers them.
    pub fn silent_on_handshake(mut self) -> Self {
        self.answer_handshake = false;
        self
    }

    /// Accepts settlement queries but never answers them.
    pub fn silent_on_queries(mut self) -> Self {
        self.answer_queries = false;
        self
    }

    /// Rejects settlement queries at send time with the given return code.
    pub fn with_rejected_queries(mut self, code: i32) -> Self {
        self.reject_queries = Some(code);
        self
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    fn respond(&self, response: Response) {
        if let Some(sink) = &self.shared().sink {
            sink.response(response);
        }
    }

    fn answer_settlement(&self, request_id: RequestId) {
        if self.settlement.is_empty() {
            self.respond(Response::new(
                request_id,
                true,
                self.settlement_error.clone(),
                ResponseBody::SettlementInfo { content: None },
            ));
            return;
        }
        let last = self.settlement.len() - 1;
        for (idx, chunk) in self.settlement.iter().enumerate() {
            let info = (idx == last).then(|| self.settlement_error.clone()).flatten();
            self.respond(Response::new(
                request_id,
                idx == last,
                info,
                ResponseBody::SettlementInfo {
                    content: Some(chunk.clone()),
                },
            ));
        }
    }
}

impl Transport for MockBroker {
    fn init(&mut self, events: EventSink) -> Result<(), TransportError> {
        if let Some(err) = &self.init_error {
            return Err(err.clone());
        }
        if self.connect_on_init {
            events.connected();
        }
        self.shared().sink = Some(events);
        Ok(())
    }

    fn send(&mut self, request_id: RequestId, request: Request) -> Result<(), TransportError> {
        debug!(request_id, ?request, "mock broker received request");
        if self.shared().sink.is_none() {
            return Err(TransportError::NotInitialized);
        }
        let kind = request.clone();
        self.shared().requests.push((request_id, request));

        match kind {
            Request::Authenticate { .. } | Request::Login { .. } | Request::SettlementConfirm { .. }
                if !self.answer_handshake => {}
            Request::Authenticate { .. } => self.respond(Response::new(
                request_id,
                true,
                self.auth_error.clone(),
                ResponseBody::Authenticate,
            )),
            Request::Login { .. } => self.respond(Response::new(
                request_id,
                true,
                self.login_error.clone(),
                ResponseBody::Login {
                    trading_day: self.trading_day.clone(),
                },
            )),
            Request::SettlementConfirm { .. } => self.respond(Response::new(
                request_id,
                true,
                self.confirm_error.clone(),
                ResponseBody::SettlementConfirm,
            )),
            Request::QuerySettlement { .. } => {
                if let Some(code) = self.reject_queries {
                    return Err(TransportError::Rejected(code));
                }
                if self.answer_queries {
                    self.answer_settlement(request_id);
                }
            }
        }
        Ok(())
    }
}

impl MockBrokerHandle {
    /// Requests sent so far, in order.
    pub fn requests(&self) -> Vec<(RequestId, Request)> {
        lock(&self.shared).requests.clone()
    }

    /// Names of the requests sent so far, in order.
    pub fn request_names(&self) -> Vec<&'static str> {
        lock(&self.shared)
            .requests
            .iter()
            .map(|(_, r)| r.name())
            .collect()
    }

    /// ID of the most recent settlement query.
    pub fn last_query_id(&self) -> Option<RequestId> {
        lock(&self.shared)
            .requests
            .iter()
            .rev()
            .find(|(_, r)| matches!(r, Request::QuerySettlement { .. }))
            .map(|(id, _)| *id)
    }

    /// Pushes an event as if delivered by the front.
    /// Returns `false` before `init` or once the session is gone.
    pub fn push(&self, event: TransportEvent) -> bool {
        lock(&self.shared)
            .sink
            .as_ref()
            .is_some_and(|sink| sink.push(event))
    }

    pub fn connect(&self) -> bool {
        self.push(TransportEvent::Connected)
    }

    pub fn disconnect(&self, reason: i32) -> bool {
        self.push(TransportEvent::Disconnected { reason })
    }

    /// Delivers a settlement chunk for the given request.
    pub fn settlement_chunk(&self, request_id: RequestId, chunk: &str, is_last: bool) -> bool {
        self.push(TransportEvent::Response(Response::new(
            request_id,
            is_last,
            None,
            ResponseBody::SettlementInfo {
                content: Some(chunk.to_string()),
            },
        )))
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
