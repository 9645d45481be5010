//! surge-core: Dispatch and statistics engine for the surge HTTP load generator
//!
//! This crate provides everything in a run that does not speak HTTP itself,
//! including:
//!
//! - Run configuration and its validation
//! - The request executor trait
//! - The bounded-concurrency dispatcher
//! - Streaming aggregation of outcomes into statistics
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod statistics;
pub mod traits;

pub use aggregator::{Aggregator, OutcomeReducer};
pub use channel::ChannelConfig;
pub use config::{parse_target, ConfigError, RunConfig, DEFAULT_CONTENT_TYPE};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherBuilder};
pub use error::{Error, Result};
pub use outcome::{
    OutcomeStatus, RequestOutcome, TransportErrorKind, NO_RESPONSE_STATUS, SUCCESS_STATUS,
};
pub use statistics::{serialize_millis, LatencySummary, Statistics, TargetStatistics};
pub use traits::RequestExecutor;

/// HTTP method type used by [`RunConfig`]
pub use reqwest::Method;
