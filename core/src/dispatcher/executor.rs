//! Dispatcher execution logic

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::aggregator::Aggregator;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::outcome::RequestOutcome;
use crate::statistics::Statistics;
use crate::traits::RequestExecutor;

/// How a single request task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskEnd {
    Completed,
    Cancelled,
    Aborted,
}

/// Summary of the launch and join phases of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// `targets x N`
    pub planned: usize,
    /// Tasks actually spawned
    pub launched: usize,
    /// Tasks that reported a cancelled outcome
    pub cancelled: usize,
    /// Tasks whose execution panicked
    pub aborted: usize,
    /// Whether a shutdown was observed before the run finished
    pub interrupted: bool,
}

/// Dispatcher manages the lifecycle of one run
///
/// Responsible for launching request tasks under the concurrency limit,
/// propagating shutdown, and closing the outcome stream once every task has
/// reported.
pub struct Dispatcher {
    /// Run configuration (shared read-only)
    pub(crate) config: Arc<RunConfig>,

    /// Request executor (shared across tasks)
    pub(crate) executor: Arc<dyn RequestExecutor>,

    /// Outcome sender (cloned for each task)
    pub(crate) outcome_tx: mpsc::Sender<RequestOutcome>,

    /// Concurrency limiter
    pub(crate) semaphore: Arc<Semaphore>,

    /// Shutdown signal sender
    pub(crate) shutdown_tx: broadcast::Sender<()>,

    /// Launch loop's shutdown receiver, subscribed at construction so an
    /// early shutdown is never missed
    pub(crate) shutdown_rx: broadcast::Receiver<()>,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// Use `DispatcherBuilder` for a more ergonomic construction.
    pub fn new(
        config: RunConfig,
        executor: Arc<dyn RequestExecutor>,
        outcome_tx: mpsc::Sender<RequestOutcome>,
    ) -> Self {
        let permits = config.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            executor,
            outcome_tx,
            semaphore,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get a handle that triggers shutdown when sent to
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Trigger shutdown of the launch loop and all in-flight tasks
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Launch every request task and wait for all of them
    ///
    /// Returns once the last task has been joined; the outcome channel is
    /// closed when this returns, so a consumer draining it terminates.
    pub async fn dispatch(self) -> DispatchReport {
        let Self {
            config,
            executor,
            outcome_tx,
            semaphore,
            shutdown_tx,
            mut shutdown_rx,
        } = self;

        let mut report = DispatchReport {
            planned: config.total_requests(),
            ..DispatchReport::default()
        };
        let mut tasks = JoinSet::new();

        tracing::info!(
            targets = config.targets.len(),
            requests_per_target = config.requests_per_target,
            concurrency = config.concurrency,
            total = report.planned,
            executor = executor.name(),
            "Starting run"
        );

        'launch: for (index, target) in config.targets.iter().enumerate() {
            for _ in 0..config.requests_per_target {
                // Subscribed before waiting so a shutdown sent while this task
                // is queued still reaches it
                let task_shutdown = shutdown_tx.subscribe();

                let permit = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        report.interrupted = true;
                        break 'launch;
                    }
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!("Concurrency limiter closed, stopping launch");
                            report.interrupted = true;
                            break 'launch;
                        }
                    },
                };

                let executor = Arc::clone(&executor);
                let outcome_tx = outcome_tx.clone();
                let target = target.clone();

                tasks.spawn(async move {
                    let _permit = permit;
                    request_task(index, target, executor, outcome_tx, task_shutdown).await
                });
                report.launched += 1;

                // Keep the join set from accumulating finished tasks
                while let Some(joined) = tasks.try_join_next() {
                    tally(&mut report, joined);
                }
            }
        }

        if report.interrupted {
            tracing::info!(
                launched = report.launched,
                planned = report.planned,
                "Shutdown received, waiting for in-flight requests"
            );
        }

        while let Some(joined) = tasks.join_next().await {
            tally(&mut report, joined);
        }

        // Last sender: the aggregator sees end-of-stream after this
        drop(outcome_tx);

        report.interrupted |= report.cancelled > 0;
        tracing::debug!(?report, "All request tasks joined");

        report
    }

    /// Run the benchmark
    ///
    /// Dispatches every request, drains `outcomes` concurrently and returns
    /// the aggregated statistics.
    pub async fn run(self, outcomes: mpsc::Receiver<RequestOutcome>) -> Result<Statistics> {
        let started = Instant::now();
        let aggregator = Aggregator::new(outcomes, self.config.targets.clone()).started_at(started);
        let aggregator_handle = tokio::spawn(aggregator.run());

        let report = self.dispatch().await;

        let mut stats = aggregator_handle
            .await
            .map_err(|e| Error::dispatch(format!("aggregator task failed: {}", e)))?;
        stats.interrupted = report.interrupted;

        tracing::info!(
            elapsed_secs = stats.wall_clock.as_secs_f64(),
            total = stats.total_requests,
            failed = stats.failed_requests,
            rps = stats.requests_per_second,
            interrupted = stats.interrupted,
            "Run completed"
        );

        Ok(stats)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Automatically triggers graceful shutdown on Ctrl+C.
    pub async fn run_with_signal_handling(
        self,
        outcomes: mpsc::Receiver<RequestOutcome>,
    ) -> Result<Statistics> {
        let shutdown_tx = self.shutdown_tx.clone();

        // Spawn signal handler task
        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                    let _ = shutdown_tx.send(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run(outcomes).await;

        signal_handle.abort();

        result
    }

    /// Run with an overall deadline, also honouring Ctrl+C
    ///
    /// Automatically triggers shutdown when the deadline is reached.
    pub async fn run_with_deadline(
        self,
        outcomes: mpsc::Receiver<RequestOutcome>,
        deadline: Duration,
    ) -> Result<Statistics> {
        let shutdown_tx = self.shutdown_tx.clone();

        let deadline_handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::info!(
                deadline_secs = deadline.as_secs_f64(),
                "Deadline reached, initiating shutdown..."
            );
            let _ = shutdown_tx.send(());
        });

        let result = self.run_with_signal_handling(outcomes).await;

        deadline_handle.abort();

        result
    }
}

/// Body of one request task
///
/// Always sends exactly one outcome: the executor's, a cancelled one if
/// shutdown wins the race, or an aborted one if execution panics.
async fn request_task(
    index: usize,
    target: url::Url,
    executor: Arc<dyn RequestExecutor>,
    outcome_tx: mpsc::Sender<RequestOutcome>,
    mut shutdown: broadcast::Receiver<()>,
) -> TaskEnd {
    let start = Instant::now();
    let execution = AssertUnwindSafe(executor.execute(&target)).catch_unwind();

    let (outcome, end) = tokio::select! {
        biased;
        _ = shutdown.recv() => (RequestOutcome::cancelled(start.elapsed()), TaskEnd::Cancelled),
        result = execution => match result {
            Ok(outcome) => (outcome, TaskEnd::Completed),
            Err(_) => {
                tracing::error!(target_index = index, url = %target, "Request task panicked");
                (RequestOutcome::aborted(start.elapsed()), TaskEnd::Aborted)
            }
        },
    };

    if outcome_tx.send(outcome.for_target(index)).await.is_err() {
        tracing::warn!(target_index = index, "Outcome receiver dropped, outcome lost");
    }

    end
}

fn tally(report: &mut DispatchReport, joined: std::result::Result<TaskEnd, JoinError>) {
    match joined {
        Ok(TaskEnd::Completed) => {}
        Ok(TaskEnd::Cancelled) => report.cancelled += 1,
        Ok(TaskEnd::Aborted) => report.aborted += 1,
        Err(e) => {
            report.aborted += 1;
            tracing::error!(error = %e, "Request task failed to join");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("executor", &self.executor.name())
            .finish()
    }
}
