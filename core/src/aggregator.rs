//! Streaming reduction of request outcomes into [`Statistics`]
//!
//! The reduction is a single pass over the outcome stream with constant memory
//! per target: counters plus running min/max/sum for each latency series. Means
//! are only computed once the stream has ended. Every step is commutative, so
//! the arrival order of outcomes does not matter.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use url::Url;

use crate::outcome::{OutcomeStatus, RequestOutcome};
use crate::statistics::{LatencySummary, Statistics, TargetStatistics};

/// Running min / max / sum of one latency series
#[derive(Debug, Clone, Copy)]
struct LatencyAccumulator {
    min: Duration,
    max: Duration,
    total: Duration,
    count: u64,
}

impl Default for LatencyAccumulator {
    fn default() -> Self {
        Self {
            min: Duration::MAX,
            max: Duration::ZERO,
            total: Duration::ZERO,
            count: 0,
        }
    }
}

impl LatencyAccumulator {
    fn record(&mut self, value: Duration) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.total = self.total.saturating_add(value);
        self.count += 1;
    }

    fn summary(&self) -> Option<LatencySummary> {
        if self.count == 0 {
            return None;
        }

        // Integer division keeps min <= mean <= max exact
        let mean_nanos = self.total.as_nanos() / u128::from(self.count);
        let mean = Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX));

        Some(LatencySummary {
            min: self.min,
            max: self.max,
            mean,
            samples: self.count,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct TargetAccumulator {
    total: u64,
    failed: u64,
    latency: LatencyAccumulator,
}

/// Synchronous outcome reduction
///
/// [`Aggregator`] drives one of these from the channel; it can also be fed
/// directly, which is what [`OutcomeReducer::reduce`] does for in-memory
/// outcome lists.
#[derive(Debug, Clone)]
pub struct OutcomeReducer {
    targets: Vec<Url>,
    total: u64,
    succeeded: u64,
    failed: u64,
    transport_failures: u64,
    cancelled: u64,
    bytes: u64,
    total_time: LatencyAccumulator,
    first_byte: LatencyAccumulator,
    last_byte: LatencyAccumulator,
    status_counts: BTreeMap<u16, u64>,
    per_target: Vec<TargetAccumulator>,
}

impl OutcomeReducer {
    /// Create an empty reduction for the given targets
    pub fn new(targets: Vec<Url>) -> Self {
        let per_target = vec![TargetAccumulator::default(); targets.len()];
        Self {
            targets,
            total: 0,
            succeeded: 0,
            failed: 0,
            transport_failures: 0,
            cancelled: 0,
            bytes: 0,
            total_time: LatencyAccumulator::default(),
            first_byte: LatencyAccumulator::default(),
            last_byte: LatencyAccumulator::default(),
            status_counts: BTreeMap::new(),
            per_target,
        }
    }

    /// Fold one outcome into the reduction
    pub fn record(&mut self, outcome: &RequestOutcome) {
        self.total += 1;
        self.total_time.record(outcome.elapsed);
        self.bytes += outcome.bytes;

        let succeeded = outcome.is_success();
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        match outcome.status {
            OutcomeStatus::Response(code) => {
                *self.status_counts.entry(code).or_insert(0) += 1;
            }
            OutcomeStatus::Transport(_) => self.transport_failures += 1,
            OutcomeStatus::Cancelled => self.cancelled += 1,
            OutcomeStatus::Aborted => {}
        }

        if let Some(first_byte) = outcome.first_byte {
            self.first_byte.record(first_byte);
        }
        if let Some(last_byte) = outcome.last_byte {
            self.last_byte.record(last_byte);
        }

        match self.per_target.get_mut(outcome.target) {
            Some(target) => {
                target.total += 1;
                if !succeeded {
                    target.failed += 1;
                }
                target.latency.record(outcome.elapsed);
            }
            None => tracing::warn!(
                target_index = outcome.target,
                "Outcome for unknown target, excluded from per-target breakdown"
            ),
        }
    }

    /// Number of outcomes recorded so far
    pub fn len(&self) -> u64 {
        self.total
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Finish the reduction
    ///
    /// `wall_clock` is the span the throughput figure is computed over.
    pub fn finish(
        self,
        wall_clock: Duration,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Statistics {
        let secs = wall_clock.as_secs_f64();
        let requests_per_second = if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        };

        let targets = self
            .targets
            .iter()
            .zip(&self.per_target)
            .map(|(url, acc)| TargetStatistics {
                url: url.to_string(),
                total_requests: acc.total,
                failed_requests: acc.failed,
                total_time: acc.latency.summary(),
            })
            .collect();

        Statistics {
            started_at,
            finished_at: chrono::Utc::now(),
            wall_clock,
            total_requests: self.total,
            succeeded_requests: self.succeeded,
            failed_requests: self.failed,
            transport_failures: self.transport_failures,
            cancelled_requests: self.cancelled,
            requests_per_second,
            total_time: self.total_time.summary(),
            time_to_first_byte: self.first_byte.summary(),
            time_to_last_byte: self.last_byte.summary(),
            status_counts: self.status_counts,
            bytes_received: self.bytes,
            targets,
            interrupted: false,
        }
    }

    /// Reduce an in-memory list of outcomes
    pub fn reduce<'a>(
        targets: Vec<Url>,
        outcomes: impl IntoIterator<Item = &'a RequestOutcome>,
        wall_clock: Duration,
    ) -> Statistics {
        let mut reducer = Self::new(targets);
        for outcome in outcomes {
            reducer.record(outcome);
        }
        reducer.finish(wall_clock, chrono::Utc::now())
    }
}

/// Single consumer of the outcome channel
///
/// Drains the channel until every sender is gone, which the dispatcher
/// guarantees only happens after every task has reported.
pub struct Aggregator {
    outcomes: mpsc::Receiver<RequestOutcome>,
    reducer: OutcomeReducer,
    started: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl Aggregator {
    /// Create an aggregator whose wall clock starts now
    pub fn new(outcomes: mpsc::Receiver<RequestOutcome>, targets: Vec<Url>) -> Self {
        Self {
            outcomes,
            reducer: OutcomeReducer::new(targets),
            started: Instant::now(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Measure the wall clock from an earlier instant (e.g. dispatch start)
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// Consume the stream and produce the final statistics
    pub async fn run(mut self) -> Statistics {
        while let Some(outcome) = self.outcomes.recv().await {
            tracing::trace!(
                target_index = outcome.target,
                status = %outcome.status,
                elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0,
                "Outcome received"
            );
            self.reducer.record(&outcome);
        }

        let wall_clock = self.started.elapsed();
        tracing::debug!(
            outcomes = self.reducer.len(),
            wall_clock_ms = wall_clock.as_millis() as u64,
            "Outcome stream closed"
        );

        self.reducer.finish(wall_clock, self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::TransportErrorKind;

    fn target() -> Vec<Url> {
        vec![Url::parse("http://localhost:8080/").unwrap()]
    }

    fn ok(ms: u64) -> RequestOutcome {
        let elapsed = Duration::from_millis(ms);
        RequestOutcome::response(200, elapsed).with_timings(elapsed / 4, elapsed)
    }

    #[test]
    fn test_single_outcome_min_max_mean_equal() {
        let outcomes = vec![RequestOutcome::response(200, Duration::from_millis(250))];
        let stats = OutcomeReducer::reduce(target(), &outcomes, Duration::from_secs(1));

        let total = stats.total_time.unwrap();
        assert_eq!(total.min, Duration::from_millis(250));
        assert_eq!(total.max, Duration::from_millis(250));
        assert_eq!(total.mean, Duration::from_millis(250));
        assert_eq!(total.samples, 1);
    }

    #[test]
    fn test_empty_stream_is_degenerate() {
        let stats = OutcomeReducer::reduce(target(), &[], Duration::ZERO);

        assert!(stats.is_degenerate());
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.requests_per_second, 0.0);
        assert!(stats.total_time.is_none());
        assert!(stats.time_to_first_byte.is_none());
        assert!(stats.time_to_last_byte.is_none());
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_failure_classification() {
        let outcomes = vec![
            RequestOutcome::response(200, Duration::from_millis(10)),
            RequestOutcome::response(299, Duration::from_millis(10)),
            RequestOutcome::response(199, Duration::from_millis(10)),
            RequestOutcome::response(301, Duration::from_millis(10)),
            RequestOutcome::response(500, Duration::from_millis(10)),
            RequestOutcome::transport(TransportErrorKind::Connect, Duration::from_millis(1)),
            RequestOutcome::cancelled(Duration::from_millis(5)),
        ];
        let stats = OutcomeReducer::reduce(target(), &outcomes, Duration::from_secs(1));

        assert_eq!(stats.total_requests, 7);
        assert_eq!(stats.succeeded_requests, 2);
        assert_eq!(stats.failed_requests, 5);
        assert_eq!(stats.transport_failures, 1);
        assert_eq!(stats.cancelled_requests, 1);
        assert_eq!(
            stats.total_requests,
            stats.failed_requests + stats.succeeded_requests
        );
        assert_eq!(stats.status_counts.get(&500), Some(&1));
        assert_eq!(stats.status_counts.get(&200), Some(&1));
    }

    #[test]
    fn test_min_mean_max_ordering() {
        let outcomes: Vec<_> = [7, 3, 120, 45, 45, 9, 1000, 2]
            .into_iter()
            .map(ok)
            .collect();
        let stats = OutcomeReducer::reduce(target(), &outcomes, Duration::from_secs(2));

        for summary in [
            stats.total_time,
            stats.time_to_first_byte,
            stats.time_to_last_byte,
        ] {
            let summary = summary.unwrap();
            assert!(summary.min <= summary.mean);
            assert!(summary.mean <= summary.max);
        }

        let total = stats.total_time.unwrap();
        assert_eq!(total.min, Duration::from_millis(2));
        assert_eq!(total.max, Duration::from_millis(1000));
        assert_eq!(total.mean, Duration::from_nanos(153_875_000));
    }

    #[test]
    fn test_first_byte_only_counts_measured_outcomes() {
        let outcomes = vec![
            ok(40),
            RequestOutcome::transport(TransportErrorKind::Timeout, Duration::from_secs(5)),
        ];
        let stats = OutcomeReducer::reduce(target(), &outcomes, Duration::from_secs(5));

        assert_eq!(stats.total_time.unwrap().samples, 2);
        let ttfb = stats.time_to_first_byte.unwrap();
        assert_eq!(ttfb.samples, 1);
        assert_eq!(ttfb.min, Duration::from_millis(10));
    }

    #[test]
    fn test_throughput_uses_wall_clock() {
        let outcomes: Vec<_> = (0..10).map(|_| ok(10)).collect();
        let stats = OutcomeReducer::reduce(target(), &outcomes, Duration::from_millis(500));
        assert!((stats.requests_per_second - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_target_breakdown() {
        let targets = vec![
            Url::parse("http://a.test/").unwrap(),
            Url::parse("http://b.test/").unwrap(),
        ];
        let outcomes = vec![
            ok(10).for_target(0),
            ok(20).for_target(1),
            RequestOutcome::response(404, Duration::from_millis(5)).for_target(1),
            ok(30).for_target(7),
        ];
        let stats = OutcomeReducer::reduce(targets, &outcomes, Duration::from_secs(1));

        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.targets.len(), 2);
        assert_eq!(stats.targets[0].url, "http://a.test/");
        assert_eq!(stats.targets[0].total_requests, 1);
        assert_eq!(stats.targets[1].total_requests, 2);
        assert_eq!(stats.targets[1].failed_requests, 1);
    }

    #[test]
    fn test_statistics_json_uses_milliseconds() {
        let outcomes = vec![RequestOutcome::response(200, Duration::from_millis(250))];
        let stats = OutcomeReducer::reduce(target(), &outcomes, Duration::from_secs(1));
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["total_time"]["mean_ms"], 250.0);
        assert_eq!(json["wall_clock_ms"], 1000.0);
        assert_eq!(json["total_requests"], 1);
    }

    #[tokio::test]
    async fn test_aggregator_drains_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let aggregator = Aggregator::new(rx, target());
        let handle = tokio::spawn(aggregator.run());

        for ms in [5, 15, 25] {
            tx.send(ok(ms)).await.unwrap();
        }
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_time.unwrap().mean, Duration::from_millis(15));
        assert!(stats.finished_at >= stats.started_at);
    }

    #[tokio::test]
    async fn test_aggregator_empty_channel() {
        let (tx, rx) = mpsc::channel::<RequestOutcome>(1);
        drop(tx);

        let stats = Aggregator::new(rx, Vec::new()).run().await;
        assert!(stats.is_degenerate());
        assert!(stats.targets.is_empty());
    }
}
