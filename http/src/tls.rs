//! TLS protocol version probing
//!
//! Each version is tried with a dedicated client whose minimum and maximum
//! protocol version are pinned to it, so a successful response proves the
//! server accepts exactly that version.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use surge_core::serialize_millis;
use thiserror::Error;
use url::Url;

use crate::client::{build_client, ClientOptions};

/// Prober construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Only https targets have a TLS handshake to probe
    #[error("TLS probing requires an https URL, got '{0}'")]
    NotHttps(String),
}

/// TLS protocol versions that can be probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TlsVersion {
    /// TLS 1.0
    #[serde(rename = "TLS 1.0")]
    Tls1_0,
    /// TLS 1.1
    #[serde(rename = "TLS 1.1")]
    Tls1_1,
    /// TLS 1.2
    #[serde(rename = "TLS 1.2")]
    Tls1_2,
    /// TLS 1.3
    #[serde(rename = "TLS 1.3")]
    Tls1_3,
}

impl TlsVersion {
    /// Every version, oldest first
    pub const ALL: [TlsVersion; 4] = [
        TlsVersion::Tls1_0,
        TlsVersion::Tls1_1,
        TlsVersion::Tls1_2,
        TlsVersion::Tls1_3,
    ];

    /// Human-readable label, e.g. "TLS 1.2"
    pub fn label(&self) -> &'static str {
        match self {
            TlsVersion::Tls1_0 => "TLS 1.0",
            TlsVersion::Tls1_1 => "TLS 1.1",
            TlsVersion::Tls1_2 => "TLS 1.2",
            TlsVersion::Tls1_3 => "TLS 1.3",
        }
    }

    /// Corresponding reqwest protocol version
    pub fn protocol_version(&self) -> reqwest::tls::Version {
        match self {
            TlsVersion::Tls1_0 => reqwest::tls::Version::TLS_1_0,
            TlsVersion::Tls1_1 => reqwest::tls::Version::TLS_1_1,
            TlsVersion::Tls1_2 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls1_3 => reqwest::tls::Version::TLS_1_3,
        }
    }

    /// Versions below TLS 1.2, which rustls does not implement
    pub fn is_legacy(&self) -> bool {
        matches!(self, TlsVersion::Tls1_0 | TlsVersion::Tls1_1)
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened when probing one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The handshake succeeded and the server answered with this status
    Status(u16),
    /// The local TLS backend cannot speak this version
    Unsupported(String),
    /// The request failed (handshake rejected, connect error, timeout, ...)
    Failed(String),
}

impl ProbeOutcome {
    /// Whether the server accepted the version
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProbeOutcome::Status(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Status(code) => write!(f, "status {}", code),
            ProbeOutcome::Unsupported(reason) => write!(f, "not supported locally ({})", reason),
            ProbeOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Result of probing one TLS version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsProbeResult {
    /// Probed version
    pub version: TlsVersion,
    /// Time spent on the probe, including client construction
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// How it went
    pub outcome: ProbeOutcome,
}

/// Probes which TLS versions an https target accepts
#[derive(Debug, Clone)]
pub struct TlsProber {
    target: Url,
    timeout: Option<Duration>,
    insecure: bool,
}

impl TlsProber {
    /// Create a prober for an https target
    pub fn new(target: Url) -> Result<Self, ProbeError> {
        if target.scheme() != "https" {
            return Err(ProbeError::NotHttps(target.to_string()));
        }

        Ok(Self {
            target,
            timeout: None,
            insecure: false,
        })
    }

    /// Limit each probe request
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip certificate verification
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Probe a single version with a GET request
    pub async fn probe(&self, version: TlsVersion) -> TlsProbeResult {
        let start = Instant::now();
        let options = ClientOptions {
            timeout: self.timeout,
            insecure: self.insecure,
            pool_idle_per_host: 0,
            tls_version: Some(version),
        };

        let outcome = match build_client(&options) {
            Ok(client) => match client.get(self.target.clone()).send().await {
                Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
                Err(e) => ProbeOutcome::Failed(error_chain(&e)),
            },
            Err(e) => ProbeOutcome::Unsupported(e.to_string()),
        };

        let elapsed = start.elapsed();
        tracing::debug!(
            url = %self.target,
            version = %version,
            outcome = %outcome,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "TLS probe finished"
        );

        TlsProbeResult {
            version,
            elapsed,
            outcome,
        }
    }

    /// Probe every version in order, one after another
    pub async fn probe_all(&self) -> Vec<TlsProbeResult> {
        let mut results = Vec::with_capacity(TlsVersion::ALL.len());
        for version in TlsVersion::ALL {
            results.push(self.probe(version).await);
        }
        results
    }
}

/// Flatten an error and its sources into one line
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[test]
    fn test_versions_in_order() {
        let labels: Vec<_> = TlsVersion::ALL.iter().map(|v| v.label()).collect();
        assert_eq!(labels, ["TLS 1.0", "TLS 1.1", "TLS 1.2", "TLS 1.3"]);
        assert!(TlsVersion::Tls1_0 < TlsVersion::Tls1_3);
        assert_eq!(TlsVersion::Tls1_2.to_string(), "TLS 1.2");
        assert!(TlsVersion::Tls1_1.is_legacy());
        assert!(!TlsVersion::Tls1_2.is_legacy());
    }

    #[test]
    fn test_prober_rejects_plain_http() {
        let err = TlsProber::new(Url::parse("http://example.com/").unwrap()).unwrap_err();
        assert_eq!(err, ProbeError::NotHttps("http://example.com/".to_string()));
    }

    #[test]
    fn test_probe_result_json() {
        let result = TlsProbeResult {
            version: TlsVersion::Tls1_3,
            elapsed: Duration::from_millis(12),
            outcome: ProbeOutcome::Status(200),
        };
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["version"], "TLS 1.3");
        assert_eq!(json["elapsed_ms"], 12.0);
        assert_eq!(json["outcome"]["result"], "status");
        assert_eq!(json["outcome"]["detail"], 200);
    }

    #[tokio::test]
    async fn test_closed_port_accepts_no_version() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = TlsProber::new(Url::parse(&format!("https://{}/", addr)).unwrap())
            .unwrap()
            .timeout(Some(Duration::from_secs(2)));
        let results = prober.probe_all().await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| !r.outcome.is_accepted()));
        let versions: Vec<_> = results.iter().map(|r| r.version).collect();
        assert_eq!(versions, TlsVersion::ALL);
    }

    #[tokio::test]
    async fn test_legacy_versions_reach_the_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let prober = TlsProber::new(Url::parse(&format!("https://{}/", addr)).unwrap())
            .unwrap()
            .timeout(Some(Duration::from_secs(2)));

        for version in [TlsVersion::Tls1_0, TlsVersion::Tls1_1] {
            let before = accepted.load(Ordering::SeqCst);
            let result = prober.probe(version).await;

            assert!(
                matches!(result.outcome, ProbeOutcome::Failed(_)),
                "{}: {}",
                version,
                result.outcome
            );

            // the handshake may fail before the accept loop has counted the socket
            let connected = tokio::time::timeout(Duration::from_secs(1), async {
                while accepted.load(Ordering::SeqCst) == before {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await;
            assert!(connected.is_ok(), "{} never connected", version);
        }
    }
}
