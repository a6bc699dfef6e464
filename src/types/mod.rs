mod event;
mod request;

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

pub use event::*;
pub use request::Request;

/// ID the transport tags every outbound request and its responses with.
/// Unique only within a single session.
pub type RequestId = u32;

/// Broker-side error code; zero means success.
pub type ErrorId = i32;

/// Monotonically increasing [`RequestId`] source.
///
/// The first allocated ID is 1.
#[derive(Debug, Default)]
pub struct RequestIdGen {
    last: AtomicU32,
}

impl RequestIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next request ID. After `u32::MAX` the sequence wraps
    /// around to 1, zero is never handed out.
    pub fn next_id(&self) -> RequestId {
        let prev = match self
            .last
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| Some(Self::after(last)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        Self::after(prev)
    }

    fn after(last: RequestId) -> RequestId {
        last.checked_add(1).unwrap_or(1)
    }

    /// Last allocated ID, zero if none were allocated yet.
    pub fn last(&self) -> RequestId {
        self.last.load(Ordering::Relaxed)
    }
}

/// Trading day in `YYYYMMDD` form, as reported by the broker on login
/// and as accepted by the settlement query.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct TradingDay(String);

impl TradingDay {
    /// Validates the day is exactly eight ASCII digits.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradingDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TradingDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid trading day '{s}', expected YYYYMMDD"))
    }
}
