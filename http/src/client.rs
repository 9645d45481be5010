//! reqwest client construction

use std::time::Duration;

use reqwest::Client;
use surge_core::{Error, Result, RunConfig};

use crate::tls::TlsVersion;

/// `User-Agent` sent with every request
pub const USER_AGENT: &str = concat!("surge/", env!("CARGO_PKG_VERSION"));

/// Settings for building a [`Client`]
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Total per-request timeout; `None` leaves reqwest's default (none)
    pub timeout: Option<Duration>,

    /// Accept invalid certificates and host names
    pub insecure: bool,

    /// Idle connections kept per host
    pub pool_idle_per_host: usize,

    /// Pin both the minimum and maximum TLS version
    pub tls_version: Option<TlsVersion>,
}

impl ClientOptions {
    /// Options for the load-generating client of a run
    ///
    /// The idle pool is sized to the concurrency limit so every in-flight
    /// slot can reuse a connection.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            timeout: config.timeout,
            insecure: config.insecure,
            pool_idle_per_host: config.concurrency,
            tls_version: None,
        }
    }
}

/// Build a client from the given options
///
/// # Errors
///
/// Returns [`Error::Client`] if reqwest rejects the configuration, e.g. a TLS
/// version the TLS backend does not implement.
pub fn build_client(options: &ClientOptions) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(options.pool_idle_per_host)
        .tcp_nodelay(true)
        .danger_accept_invalid_certs(options.insecure);

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    // rustls implements neither TLS 1.0 nor 1.1
    builder = match options.tls_version {
        Some(version) if version.is_legacy() => builder
            .use_native_tls()
            .min_tls_version(version.protocol_version())
            .max_tls_version(version.protocol_version()),
        Some(version) => builder
            .use_rustls_tls()
            .min_tls_version(version.protocol_version())
            .max_tls_version(version.protocol_version()),
        None => builder.use_rustls_tls(),
    };

    builder.build().map_err(|e| Error::client(e.to_string()))
}
