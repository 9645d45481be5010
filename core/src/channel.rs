//! Channel configuration for the outcome stream

/// Default outcome buffer, also the cap applied by [`ChannelConfig::for_requests`]
const DEFAULT_OUTCOME_BUFFER: usize = 10_000;

/// Buffer configuration for the request tasks -> aggregator channel
///
/// The channel is bounded and senders wait for capacity, so a full buffer
/// slows producers down instead of dropping outcomes.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Outcome channel buffer size
    pub outcome_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            outcome_buffer: DEFAULT_OUTCOME_BUFFER,
        }
    }
}

impl ChannelConfig {
    /// Size the buffer for a run of `total` requests
    ///
    /// Small runs get one slot per request; large runs are capped.
    pub fn for_requests(total: usize) -> Self {
        Self {
            outcome_buffer: total.clamp(1, DEFAULT_OUTCOME_BUFFER),
        }
    }

    /// Create a new channel config with custom outcome buffer size
    pub fn with_outcome_buffer(mut self, size: usize) -> Self {
        self.outcome_buffer = size;
        self
    }

    /// Buffer size actually used; `tokio::sync::mpsc` rejects zero
    pub(crate) fn effective_buffer(&self) -> usize {
        self.outcome_buffer.max(1)
    }
}
