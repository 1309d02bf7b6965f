//! Async request protocol helpers.
//!
//! A request sent with `Prefer: respond-async` is answered with `202` and a
//! `Location` header pointing at `/_async('{id}')`. The client polls that
//! endpoint until it stops answering `202`, and may cancel the work with a
//! `DELETE` on the same endpoint.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::response::RestResponse;

/// Header asking the server to run the request asynchronously.
pub const PREFER_ASYNC: &str = "respond-async";

/// Header carrying the real status of a completed async request.
pub const ASYNC_RESULT_HEADER: &str = "asyncresult";

static ASYNC_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_async\('([^']+)'\)").expect("Invalid regex"));

/// Extracts the async ID from a `Location` header value.
pub fn extract_async_id(location: &str) -> Option<String> {
    ASYNC_ID_RE
        .captures(location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Endpoint of an async operation.
pub fn async_endpoint(id: &str) -> String {
    format!("/_async('{id}')")
}

/// Parses an `asyncresult` header value such as `201 Created`.
pub fn parse_async_result(value: &str) -> Option<StatusCode> {
    let code = value.split_whitespace().next()?.parse::<u16>().ok()?;
    StatusCode::from_u16(code).ok()
}

/// Returns the `asyncresult` status carried by a response, if any.
pub fn async_result_status(headers: &HeaderMap) -> Option<StatusCode> {
    headers
        .get(ASYNC_RESULT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_async_result)
}

/// True if the body is a complete HTTP response wrapped as text.
pub fn is_embedded_http(body: &[u8]) -> bool {
    body.starts_with(b"HTTP/")
}

// ============================================================================
// Poll State
// ============================================================================

/// What a poll of `/_async('{id}')` told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// `200`/`201`: the result is ready.
    Complete,
    /// `202`: still running.
    Running,
    /// Any other status.
    Failed,
}

impl PollState {
    /// Classifies a poll response status.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::OK | StatusCode::CREATED => Self::Complete,
            StatusCode::ACCEPTED => Self::Running,
            _ => Self::Failed,
        }
    }
}

/// Outcome of sending a request in async mode.
#[derive(Debug)]
pub enum AsyncStart {
    /// The server accepted the work under this ID.
    Accepted(String),
    /// The server answered directly without an async ID.
    Completed(RestResponse),
}

// ============================================================================
// Poll Schedule
// ============================================================================

/// Delays between polls: a fixed ramp, then a constant cap.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    /// Initial delays, in order.
    pub ramp: Vec<Duration>,
    /// Delay once the ramp is exhausted.
    pub cap: Duration,
}

impl PollSchedule {
    /// Creates a schedule.
    pub fn new(ramp: Vec<Duration>, cap: Duration) -> Self {
        Self { ramp, cap }
    }

    /// Delay before poll number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.ramp.get(index).copied().unwrap_or(self.cap).min(self.cap)
    }
}

impl Default for PollSchedule {
    /// 100 ms, 300 ms, 600 ms, then 1 s.
    fn default() -> Self {
        Self::new(
            vec![
                Duration::from_millis(100),
                Duration::from_millis(300),
                Duration::from_millis(600),
            ],
            Duration::from_secs(1),
        )
    }
}
