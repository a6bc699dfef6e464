//! Chunked response assembly keyed by request ID.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    types::{RequestId, RspInfo},
};

/// Assembled settlement query response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementContent {
    /// ID of the query request.
    pub request_id: RequestId,

    /// Concatenation of all received chunks, in arrival order.
    pub text: String,

    /// Broker error attached to the response, if any. The text then holds
    /// whatever partial content arrived before the last chunk.
    pub error: Option<RspInfo>,
}

pub type QueryResult = Result<SettlementContent, SessionError>;

/// Query awaiting its last chunk.
#[derive(Debug)]
struct PendingQuery {
    chunks: Vec<String>,
    error: Option<RspInfo>,
    waiter: oneshot::Sender<QueryResult>,
}

/// Buffers response chunks per outstanding request and releases the
/// assembled payload to the waiting caller once the last chunk arrives.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<RequestId, PendingQuery>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queries still waiting for their last chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Registers a query to collect chunks for.
    pub fn issue(&mut self, request_id: RequestId, waiter: oneshot::Sender<QueryResult>) {
        let prev = self.pending.insert(
            request_id,
            PendingQuery {
                chunks: vec![],
                error: None,
                waiter,
            },
        );
        if prev.is_some() {
            warn!(request_id, "request id reused, previous pending query dropped");
        }
    }

    /// Appends a chunk to the pending query, completing it if `is_last`.
    ///
    /// Empty chunks are kept to preserve ordering. Chunks for unknown or
    /// abandoned requests are discarded.
    ///
    /// # Returns
    ///
    /// `true` if the chunk completed a query and its waiter was woken.
    pub fn on_chunk(
        &mut self,
        request_id: RequestId,
        chunk: Option<&str>,
        is_last: bool,
        info: Option<&RspInfo>,
    ) -> bool {
        let Some(query) = self.pending.get_mut(&request_id) else {
            match info.filter(|i| i.is_error()) {
                Some(info) => warn!(
                    request_id,
                    code = info.error_id,
                    message = %info.error_msg,
                    "broker error for unknown or abandoned request discarded"
                ),
                None => debug!(request_id, is_last, "chunk for unknown or abandoned request discarded"),
            }
            return false;
        };

        let chunk = chunk.unwrap_or_default();
        debug!(request_id, len = chunk.len(), is_last, "settlement chunk");
        query.chunks.push(chunk.to_string());

        if let Some(info) = info.filter(|i| i.is_error()) {
            warn!(
                request_id,
                code = info.error_id,
                message = %info.error_msg,
                "query response carries broker error"
            );
            query.error = Some(info.clone());
        }

        if !is_last {
            return false;
        }

        let Some(query) = self.pending.remove(&request_id) else {
            return false;
        };
        let content = SettlementContent {
            request_id,
            text: query.chunks.concat(),
            error: query.error,
        };
        info!(
            request_id,
            chunks = query.chunks.len(),
            len = content.text.len(),
            "settlement query completed"
        );
        if query.waiter.send(Ok(content)).is_err() {
            debug!(request_id, "query caller gone, result dropped");
        }
        true
    }

    /// Forgets a pending query, its late chunks get discarded.
    pub fn abandon(&mut self, request_id: RequestId) -> bool {
        let removed = self.pending.remove(&request_id).is_some();
        if removed {
            debug!(request_id, "pending query abandoned");
        }
        removed
    }

    /// Completes a pending query with an error, e.g. when its request could
    /// not be sent.
    pub fn fail(&mut self, request_id: RequestId, err: SessionError) -> bool {
        let Some(query) = self.pending.remove(&request_id) else {
            return false;
        };
        _ = query.waiter.send(Err(err));
        true
    }

    /// Completes every pending query with the given error.
    pub fn fail_all(&mut self, err: SessionError) {
        for (request_id, query) in self.pending.drain() {
            debug!(request_id, %err, "pending query failed");
            _ = query.waiter.send(Err(err.clone()));
        }
    }
}
