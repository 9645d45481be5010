//! Per-request outcome types

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Status code reported for requests that never produced an HTTP response
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Range of status codes counted as successful
pub const SUCCESS_STATUS: std::ops::RangeInclusive<u16> = 200..=299;

/// Why a request failed below the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// DNS, TCP connect or TLS handshake failure
    Connect,
    /// The request did not finish within the configured timeout
    Timeout,
    /// The request could not be built or sent
    Request,
    /// The response body could not be read
    Body,
    /// Redirect policy violation
    Redirect,
    /// Anything else reported by the HTTP client
    Other,
}

impl TransportErrorKind {
    /// Short label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
            Self::Redirect => "redirect",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// An HTTP response arrived (any status code)
    Response(u16),
    /// The request failed before a complete response was read
    Transport(TransportErrorKind),
    /// The run was interrupted while the request was in flight
    Cancelled,
    /// The request task died; the outcome was synthesised in its place
    Aborted,
}

impl OutcomeStatus {
    /// HTTP status code, or [`NO_RESPONSE_STATUS`] when there was no response
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Response(code) => *code,
            _ => NO_RESPONSE_STATUS,
        }
    }

    /// Whether the request counts as succeeded (2xx response)
    pub fn is_success(&self) -> bool {
        SUCCESS_STATUS.contains(&self.status_code())
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(code) => write!(f, "{}", code),
            Self::Transport(kind) => write!(f, "transport error ({})", kind),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Result of one dispatched request
///
/// Exactly one outcome is produced per launched task, whatever happened to
/// the request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// Index of the target in [`crate::RunConfig::targets`]
    pub target: usize,

    /// How the request ended
    pub status: OutcomeStatus,

    /// Time from dispatch to completion or failure
    pub elapsed: Duration,

    /// Time until the response head arrived
    pub first_byte: Option<Duration>,

    /// Time until the response body was fully read
    pub last_byte: Option<Duration>,

    /// Response body bytes received
    pub bytes: u64,
}

impl RequestOutcome {
    /// Outcome for a request that received an HTTP response
    pub fn response(status: u16, elapsed: Duration) -> Self {
        Self::new(OutcomeStatus::Response(status), elapsed)
    }

    /// Outcome for a request that failed in transport
    pub fn transport(kind: TransportErrorKind, elapsed: Duration) -> Self {
        Self::new(OutcomeStatus::Transport(kind), elapsed)
    }

    /// Outcome for a request cut short by run cancellation
    pub fn cancelled(elapsed: Duration) -> Self {
        Self::new(OutcomeStatus::Cancelled, elapsed)
    }

    /// Outcome standing in for a task that panicked
    pub fn aborted(elapsed: Duration) -> Self {
        Self::new(OutcomeStatus::Aborted, elapsed)
    }

    fn new(status: OutcomeStatus, elapsed: Duration) -> Self {
        Self {
            target: 0,
            status,
            elapsed,
            first_byte: None,
            last_byte: None,
            bytes: 0,
        }
    }

    /// Attach measured first/last byte timings
    pub fn with_timings(mut self, first_byte: Duration, last_byte: Duration) -> Self {
        self.first_byte = Some(first_byte);
        self.last_byte = Some(last_byte);
        self
    }

    /// Attach the number of body bytes received
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    /// Set the target index
    pub fn for_target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    /// HTTP status code, or [`NO_RESPONSE_STATUS`]
    pub fn status_code(&self) -> u16 {
        self.status.status_code()
    }

    /// Whether the request counts as succeeded
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range_is_inclusive() {
        assert!(OutcomeStatus::Response(200).is_success());
        assert!(OutcomeStatus::Response(299).is_success());
        assert!(!OutcomeStatus::Response(199).is_success());
        assert!(!OutcomeStatus::Response(300).is_success());
        assert!(!OutcomeStatus::Response(503).is_success());
    }

    #[test]
    fn test_failures_use_sentinel_status() {
        let outcome = RequestOutcome::transport(TransportErrorKind::Connect, Duration::ZERO);
        assert_eq!(outcome.status_code(), NO_RESPONSE_STATUS);
        assert!(!outcome.is_success());

        assert_eq!(OutcomeStatus::Cancelled.status_code(), 0);
        assert_eq!(OutcomeStatus::Aborted.status_code(), 0);
    }

    #[test]
    fn test_outcome_builders() {
        let outcome = RequestOutcome::response(204, Duration::from_millis(30))
            .with_timings(Duration::from_millis(10), Duration::from_millis(29))
            .with_bytes(512)
            .for_target(3);

        assert_eq!(outcome.target, 3);
        assert_eq!(outcome.first_byte, Some(Duration::from_millis(10)));
        assert_eq!(outcome.last_byte, Some(Duration::from_millis(29)));
        assert_eq!(outcome.bytes, 512);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(OutcomeStatus::Response(404).to_string(), "404");
        assert_eq!(
            OutcomeStatus::Transport(TransportErrorKind::Timeout).to_string(),
            "transport error (timeout)"
        );
        assert_eq!(OutcomeStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OutcomeStatus::Transport(TransportErrorKind::Connect))
            .unwrap();
        assert_eq!(json, r#"{"transport":"connect"}"#);

        let json = serde_json::to_string(&OutcomeStatus::Response(200)).unwrap();
        assert_eq!(json, r#"{"response":200}"#);
    }
}
