//! HTTP implementations for surge
//!
//! This crate provides the reqwest-backed pieces of a run:
//!
//! - Client construction shared by the executor and the prober
//! - `HttpExecutor`, the `RequestExecutor` used for real load
//! - `TlsProber`, which checks which TLS protocol versions a server accepts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod executor;
pub mod tls;


pub use client::{build_client, ClientOptions, USER_AGENT};
pub use executor::HttpExecutor;
pub use tls::{ProbeError, ProbeOutcome, TlsProbeResult, TlsProber, TlsVersion};
