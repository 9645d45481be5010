//! Terminal statistics of a run

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Serialize a `Duration` as fractional milliseconds
pub fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// Min / max / mean of one latency series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    /// Fastest observation
    #[serde(rename = "min_ms", serialize_with = "serialize_millis")]
    pub min: Duration,
    /// Slowest observation
    #[serde(rename = "max_ms", serialize_with = "serialize_millis")]
    pub max: Duration,
    /// Arithmetic mean
    #[serde(rename = "mean_ms", serialize_with = "serialize_millis")]
    pub mean: Duration,
    /// Number of observations
    pub samples: u64,
}

/// Per-target breakdown (meaningful in list mode)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStatistics {
    /// Target URL
    pub url: String,
    /// Outcomes received for this target
    pub total_requests: u64,
    /// Outcomes outside the 2xx range
    pub failed_requests: u64,
    /// Total request time for this target
    pub total_time: Option<LatencySummary>,
}

/// Aggregate statistics of one run
///
/// Produced once by the aggregator after the outcome stream closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// When aggregation started
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// When the outcome stream closed
    pub finished_at: chrono::DateTime<chrono::Utc>,

    /// Wall-clock span from dispatch start to end of aggregation
    #[serde(rename = "wall_clock_ms", serialize_with = "serialize_millis")]
    pub wall_clock: Duration,

    /// Outcomes received
    pub total_requests: u64,

    /// Outcomes with a 2xx status
    pub succeeded_requests: u64,

    /// Outcomes outside the 2xx range (including transport failures)
    pub failed_requests: u64,

    /// Failures that never produced a response
    pub transport_failures: u64,

    /// Requests cut short by an interrupt
    pub cancelled_requests: u64,

    /// `total_requests / wall_clock`
    pub requests_per_second: f64,

    /// Total request time
    pub total_time: Option<LatencySummary>,

    /// Time until the response head arrived
    pub time_to_first_byte: Option<LatencySummary>,

    /// Time until the response body was fully read
    pub time_to_last_byte: Option<LatencySummary>,

    /// Response count per HTTP status code
    pub status_counts: BTreeMap<u16, u64>,

    /// Body bytes received across all responses
    pub bytes_received: u64,

    /// Per-target breakdown, in target order
    pub targets: Vec<TargetStatistics>,

    /// Whether the run was interrupted before all requests were launched
    pub interrupted: bool,
}

impl Statistics {
    /// Whether no request completed at all
    pub fn is_degenerate(&self) -> bool {
        self.total_requests == 0
    }

    /// Share of requests that succeeded (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_requests > 0 {
            self.succeeded_requests as f64 / self.total_requests as f64
        } else {
            0.0
        }
    }
}
