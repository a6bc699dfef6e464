//! Seam between the session and the vendor trader API.
//!
//! The vendor API pushes everything through callbacks invoked on its own
//! threads. A [`Transport`] implementation bridges it by forwarding each callback
//! into the [`EventSink`] handed over in [`Transport::init`], and by translating
//! [`Request`]s into the corresponding API calls.
//!
//! TCP-level reconnects are owned by the transport; the session only observes
//! the resulting [`TransportEvent::Connected`]/[`TransportEvent::Disconnected`]
//! events.

use tokio::sync::mpsc;

use crate::{
    error::TransportError,
    types::{Request, RequestId, Response, TransportEvent},
};

/// Outbound half of the vendor API.
pub trait Transport: Send + 'static {
    /// Registers the event sink and starts connecting to the front.
    /// Connection outcome is reported through the sink.
    fn init(&mut self, events: EventSink) -> Result<(), TransportError>;

    /// Sends a request. Fire-and-forget: the response arrives through the
    /// sink, exactly once per request (possibly in several chunks).
    fn send(&mut self, request_id: RequestId, request: Request) -> Result<(), TransportError>;
}

/// Inbound half: cloneable handle callbacks push events into.
///
/// Never blocks, so it is safe to call from the vendor's callback threads.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { tx }
    }

    /// Forwards an event to the session.
    /// Returns `false` if the session is gone and the event was dropped.
    pub fn push(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn connected(&self) -> bool {
        self.push(TransportEvent::Connected)
    }

    pub fn disconnected(&self, reason: i32) -> bool {
        self.push(TransportEvent::Disconnected { reason })
    }

    pub fn response(&self, response: Response) -> bool {
        self.push(TransportEvent::Response(response))
    }
}
