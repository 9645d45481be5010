//! Core traits for request executors
//!
//! The trait lives in core so the dispatcher can stay independent of the HTTP
//! stack. The reqwest implementation lives in `surge-http`.

use crate::outcome::RequestOutcome;
use async_trait::async_trait;
use url::Url;

// ============================================================================
// Request Executor Trait
// ============================================================================

/// Performs one request against one target and reports how it went
///
/// Implementations never return an error: transport failures, timeouts and
/// bad responses are all folded into the returned [`RequestOutcome`], so a
/// single failing request can never abort a run.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Identifier used in logs (e.g. "http")
    fn name(&self) -> &str;

    /// Execute a single request against `target`
    ///
    /// The returned outcome's `target` index is overwritten by the dispatcher.
    async fn execute(&self, target: &Url) -> RequestOutcome;
}
