//! Bounded-concurrency dispatch of a benchmark run
//!
//! The dispatcher turns a [`crate::RunConfig`] into `targets x N` request
//! tasks:
//! - At most `C` tasks are in flight at once, across all targets
//! - Every launched task reports exactly one outcome, even if it panics
//! - Run cancellation is broadcast to the launch loop and every task
//! - The outcome channel closes only after every task has been joined
//!
//! # Example
//!
//! ```ignore
//! use surge_core::{ChannelConfig, DispatcherBuilder, RunConfig};
//!
//! let (dispatcher, outcomes) = DispatcherBuilder::new()
//!     .config(RunConfig::single(url).with_requests(100).with_concurrency(10))
//!     .executor(executor)
//!     .channel_config(ChannelConfig::for_requests(100))
//!     .build()?;
//!
//! let stats = dispatcher.run_with_signal_handling(outcomes).await?;
//! ```

mod builder;
mod executor;

pub use builder::DispatcherBuilder;
pub use executor::{DispatchReport, Dispatcher};
