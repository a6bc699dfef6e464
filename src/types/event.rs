use super::{ErrorId, RequestId, TradingDay};

/// Event delivered by the transport from its callback context.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Front connection established, the handshake may start.
    Connected,

    /// Front connection lost, with transport-specific reason code.
    Disconnected { reason: i32 },

    /// Response to one of the previously sent requests.
    Response(Response),
}

/// Broker status attached to a response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RspInfo {
    pub error_id: ErrorId,
    pub error_msg: String,
}

/// Single response callback, possibly one chunk of a multi-part reply.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub(crate) request_id: RequestId,
    pub(crate) is_last: bool,
    pub(crate) info: Option<RspInfo>,
    pub(crate) body: ResponseBody,
}

/// Response payload, by request type.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Authenticate,

    Login {
        /// Trading day the session was opened for, if the broker reported one.
        trading_day: Option<TradingDay>,
    },

    SettlementConfirm,

    SettlementInfo {
        /// Chunk of the statement text. Absent payloads count as empty chunks.
        ///
        /// Chunk boundaries can fall inside a multi-byte character, so a
        /// transport receiving GBK has to decode whole characters only,
        /// carrying incomplete trailing bytes over to the next chunk.
        content: Option<String>,
    },
}

impl RspInfo {
    pub fn new(error_id: ErrorId, error_msg: impl Into<String>) -> Self {
        Self {
            error_id,
            error_msg: error_msg.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_id != 0
    }
}

impl Response {
    pub fn new(
        request_id: RequestId,
        is_last: bool,
        info: Option<RspInfo>,
        body: ResponseBody,
    ) -> Self {
        Self {
            request_id,
            is_last,
            info,
            body,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn is_last(&self) -> bool {
        self.is_last
    }

    pub fn info(&self) -> Option<&RspInfo> {
        self.info.as_ref()
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Broker error carried by the response, if the error code is non-zero.
    pub fn error(&self) -> Option<&RspInfo> {
        self.info.as_ref().filter(|info| info.is_error())
    }
}
