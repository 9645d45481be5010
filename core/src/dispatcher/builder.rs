//! Builder pattern for Dispatcher construction

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channel::ChannelConfig;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::outcome::RequestOutcome;
use crate::traits::RequestExecutor;

use super::executor::Dispatcher;

/// Builder for creating a Dispatcher with proper configuration
///
/// # Example
///
/// ```ignore
/// let (dispatcher, outcomes) = DispatcherBuilder::new()
///     .config(config)
///     .executor(Arc::new(HttpExecutor::new(&config)?))
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    config: RunConfig,
    executor: Option<Arc<dyn RequestExecutor>>,
    channel_config: ChannelConfig,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            executor: None,
            channel_config: ChannelConfig::default(),
        }
    }

    /// Set the full run configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the concurrency limit
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the number of requests per target
    pub fn requests(mut self, requests_per_target: usize) -> Self {
        self.config.requests_per_target = requests_per_target;
        self
    }

    /// Set the request executor
    pub fn executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the channel configuration
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Build the dispatcher and return it along with the outcome receiver
    ///
    /// # Errors
    ///
    /// Returns an error if no executor was set or if configuration validation
    /// fails.
    pub fn build(self) -> Result<(Dispatcher, mpsc::Receiver<RequestOutcome>)> {
        let executor = self
            .executor
            .ok_or_else(|| Error::missing_config("executor"))?;

        self.config.validate()?;

        let (outcome_tx, outcome_rx) = mpsc::channel(self.channel_config.effective_buffer());

        let dispatcher = Dispatcher::new(self.config, executor, outcome_tx);

        Ok((dispatcher, outcome_rx))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
