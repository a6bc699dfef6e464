//! Sequential session over the callback-driven transport.
//!
//! # Architecture
//!
//! The module separates pure protocol logic from async I/O:
//!
//! - [`Handshake`] - Pure handshake state machine
//! - [`RequestCorrelator`] - Pure chunk assembly per request ID
//! - [`Session`] - Handle to a background task owning both, plus the
//!   [`Transport`]; public calls are "send command, await completion"
//!
//! Transport callbacks push events through [`crate::transport::EventSink`] into
//! the task, which is the only place session state gets mutated. The state is
//! published to handles through a watch channel.
//!
//! # Example
//!
//! ```ignore
//! use ctp_settle::{Credentials, config::SessionConfig, session::Session};
//!
//! let session = Session::new(Credentials::from_env()?, transport, SessionConfig::from_env()?);
//! session.connect().await?;
//!
//! let content = session.query_settlement(None).await?;
//! println!("{}", content.text);
//! ```

mod correlator;
mod handshake;

use std::sync::Arc;

use futures::{Stream, stream};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{error, info, warn};

pub use correlator::{QueryResult, RequestCorrelator, SettlementContent};
pub use handshake::{Handshake, SessionState};

use crate::{
    Credentials,
    config::SessionConfig,
    error::SessionError,
    report::{ReportParser, SettlementReport},
    transport::{EventSink, Transport},
    types::{Request, RequestId, RequestIdGen, ResponseBody, TradingDay, TransportEvent},
};

/// Snapshot of the session as published by the background task.
#[derive(Clone, Debug, Default)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Trading day reported on login.
    pub trading_day: Option<TradingDay>,

    /// Reason code of the most recent disconnect, if any happened.
    pub disconnect_reason: Option<i32>,

    /// Error that moved the session to [`SessionState::Failed`].
    pub error: Option<SessionError>,
}

enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Query {
        request_id: RequestId,
        trading_day: Option<TradingDay>,
        waiter: oneshot::Sender<QueryResult>,
    },
    Abandon(RequestId),
}

/// Handle to a trading session.
///
/// Exactly one handshake runs per session. After a disconnect or a failed
/// handshake, a new session has to be created.
pub struct Session {
    config: SessionConfig,
    ids: Arc<RequestIdGen>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    query_lock: Mutex<()>,
}

impl Session {
    /// Creates the session and spawns its background task.
    /// The transport is not touched until [`Self::connect`].
    ///
    /// # Panics
    ///
    /// If called outside of a Tokio runtime.
    pub fn new<T: Transport>(credentials: Credentials, transport: T, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let ids = Arc::new(RequestIdGen::new());

        let actor = Actor {
            transport,
            sink: EventSink::new(events_tx),
            initialized: false,
            handshake: Handshake::new(credentials, config.confirm_policy(), config.product_info()),
            correlator: RequestCorrelator::new(),
            ids: ids.clone(),
            transport_error: None,
            status: status_tx,
        };
        tokio::spawn(run_actor(actor, events_rx, commands_rx));

        Self {
            config,
            ids,
            commands: commands_tx,
            status: status_rx,
            query_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Trading day reported on login.
    pub fn trading_day(&self) -> Option<TradingDay> {
        self.status.borrow().trading_day.clone()
    }

    /// Stream of status updates, starting with the next change.
    pub fn status_stream(&self) -> impl Stream<Item = SessionStatus> + use<> {
        stream::unfold(self.status.clone(), |mut rx| async move {
            rx.changed().await.ok()?;
            let status = rx.borrow_and_update().clone();
            Some((status, rx))
        })
    }

    /// Initializes the transport and waits until the handshake either
    /// completes or fails.
    ///
    /// A disconnect during the handshake does not end the wait, the call
    /// then returns [`SessionError::Timeout`] once
    /// [`SessionConfig::connect_timeout`] elapses.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect { reply })?;
        rx.await.map_err(|_| SessionError::Closed)??;

        let mut status = self.status.clone();
        let timeout = self.config.connect_timeout();
        let settled = tokio::time::timeout(timeout, status.wait_for(|s| s.state.is_settled()))
            .await
            .map_err(|_| SessionError::Timeout("connect", timeout))?
            .map_err(|_| SessionError::Closed)?
            .clone();

        match settled.state {
            SessionState::Ready => {
                info!(trading_day = ?settled.trading_day, "session ready");
                Ok(())
            }
            _ => Err(settled.error.unwrap_or(SessionError::Closed)),
        }
    }

    /// Requests the settlement statement and waits for all of its chunks.
    ///
    /// Concurrent calls are served one at a time. If the broker flags the
    /// response with an error, the partial content is still returned with
    /// [`SettlementContent::error`] set.
    ///
    /// On timeout the query is abandoned; chunks arriving later are dropped.
    pub async fn query_settlement(
        &self,
        trading_day: Option<TradingDay>,
    ) -> Result<SettlementContent, SessionError> {
        let _guard = self.query_lock.lock().await;

        let state = self.state();
        if !state.is_ready() {
            return Err(SessionError::NotReady(state));
        }

        let request_id = self.ids.next_id();
        let (waiter, rx) = oneshot::channel();
        self.command(Command::Query {
            request_id,
            trading_day,
            waiter,
        })?;

        let timeout = self.config.query_timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(result) => result.map_err(|_| SessionError::Closed)?,
            Err(_) => {
                warn!(request_id, ?timeout, "settlement query timed out");
                _ = self.commands.send(Command::Abandon(request_id));
                Err(SessionError::Timeout("settlement query", timeout))
            }
        }
    }

    /// Queries the settlement statement and parses it.
    pub async fn fetch_report(
        &self,
        trading_day: Option<TradingDay>,
        parser: &ReportParser,
    ) -> Result<SettlementReport, SessionError> {
        let content = self.query_settlement(trading_day).await?;
        if let Some(err) = &content.error {
            warn!(
                code = err.error_id,
                message = %err.error_msg,
                "parsing partial settlement statement"
            );
        }
        Ok(parser.parse(&content.text)?)
    }

    fn command(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

/// Background task state. Sole owner of the transport and protocol state.
struct Actor<T> {
    transport: T,
    sink: EventSink,
    initialized: bool,
    handshake: Handshake,
    correlator: RequestCorrelator,
    ids: Arc<RequestIdGen>,
    transport_error: Option<SessionError>,
    status: watch::Sender<SessionStatus>,
}

async fn run_actor<T: Transport>(
    mut actor: Actor<T>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        tokio::select! {
            biased;

            Some(event) = events.recv() => actor.on_event(event),
            command = commands.recv() => {
                let Some(command) = command else {
                    // All handles dropped
                    break;
                };
                actor.on_command(command);
            }
        }
    }
    actor.correlator.fail_all(SessionError::Closed);
}

impl<T: Transport> Actor<T> {
    fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                if self.initialized {
                    _ = reply.send(Ok(()));
                    return;
                }
                info!("initializing transport");
                let result = self.transport.init(self.sink.clone());
                if let Err(err) = &result {
                    error!(%err, "transport init failed");
                } else {
                    self.initialized = true;
                }
                _ = reply.send(result.map_err(SessionError::from));
            }
            Command::Query {
                request_id,
                trading_day,
                waiter,
            } => {
                let state = self.handshake.state();
                if !state.is_ready() {
                    _ = waiter.send(Err(SessionError::NotReady(state)));
                    return;
                }
                let request = Request::query_settlement(self.handshake.credentials(), trading_day);
                info!(request_id, ?request, "querying settlement");
                self.correlator.issue(request_id, waiter);
                if let Err(err) = self.transport.send(request_id, request) {
                    error!(request_id, %err, "settlement query not sent");
                    self.correlator.fail(request_id, err.into());
                }
            }
            Command::Abandon(request_id) => {
                self.correlator.abandon(request_id);
            }
        }
    }

    fn on_event(&mut self, event: TransportEvent) {
        if let TransportEvent::Response(rsp) = &event {
            if let ResponseBody::SettlementInfo { content } = rsp.body() {
                self.correlator.on_chunk(
                    rsp.request_id(),
                    content.as_deref(),
                    rsp.is_last(),
                    rsp.info(),
                );
                return;
            }
        }

        match self.handshake.on_event(&event) {
            Ok(Some(request)) => self.send_handshake(request),
            Ok(None) => {}
            Err(err) => error!(%err, "handshake failed"),
        }
        if let TransportEvent::Disconnected { reason } = event {
            self.correlator
                .fail_all(SessionError::Disconnected { reason });
        }
        self.publish();
    }

    fn send_handshake(&mut self, request: Request) {
        let request_id = self.ids.next_id();
        let name = request.name();
        info!(request_id, request = name, "sending handshake request");
        if let Err(err) = self.transport.send(request_id, request) {
            error!(request_id, request = name, %err, "handshake request not sent");
            self.handshake.abort();
            self.transport_error = Some(err.into());
        }
    }

    fn publish(&self) {
        let hs = &self.handshake;
        let error = hs
            .failure()
            .cloned()
            .map(SessionError::from)
            .or_else(|| self.transport_error.clone());
        self.status.send_replace(SessionStatus {
            state: hs.state(),
            trading_day: hs.trading_day().cloned(),
            disconnect_reason: hs.disconnect_reason(),
            error,
        });
    }
}
