//! reqwest-backed request executor

use std::fmt::Write as _;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use surge_core::{
    ConfigError, RequestExecutor, RequestOutcome, Result, RunConfig, TransportErrorKind,
};
use url::Url;

use crate::client::{build_client, ClientOptions};

// ============================================================================
// Error classification
// ============================================================================

/// Map a reqwest error onto the transport failure taxonomy
///
/// Timeouts are checked first: a connect timeout is reported as a timeout.
pub fn classify_error(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_redirect() {
        TransportErrorKind::Redirect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else if error.is_request() || error.is_builder() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    }
}

// ============================================================================
// HttpExecutor
// ============================================================================

/// Sends one configured HTTP request per call and measures it
///
/// One instance is shared by every request task of a run, so all requests go
/// through the same connection pool.
pub struct HttpExecutor {
    client: Client,
    method: Method,
    content_type: HeaderValue,
    body: Bytes,
    print_headers: bool,
    print_body: bool,
}

impl HttpExecutor {
    /// Create an executor with a client built from `config`
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = build_client(&ClientOptions::from_config(config))?;
        Self::with_client(config, client)
    }

    /// Create an executor around an existing client
    pub fn with_client(config: &RunConfig, client: Client) -> Result<Self> {
        let content_type = HeaderValue::from_str(&config.content_type)
            .map_err(|_| ConfigError::InvalidContentType(config.content_type.clone()))?;

        Ok(Self {
            client,
            method: config.method.clone(),
            content_type,
            body: Bytes::from(config.body.clone()),
            print_headers: config.print_headers,
            print_body: config.body_printing_enabled(),
        })
    }

    fn print_head(&self, target: &Url, response: &Response) {
        let mut head = format!("{} {:?} {}\n", target, response.version(), response.status());
        for (name, value) in response.headers() {
            let _ = writeln!(head, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
        }
        // One call so concurrent tasks don't interleave their blocks
        println!("{}", head);
    }

    /// Read the body, printing it or just counting its bytes
    async fn read_body(&self, response: Response) -> reqwest::Result<u64> {
        if self.print_body {
            let body = response.bytes().await?;
            println!("{}", String::from_utf8_lossy(&body));
            return Ok(body.len() as u64);
        }

        let mut stream = response.bytes_stream();
        let mut received = 0u64;
        while let Some(chunk) = stream.next().await {
            received += chunk?.len() as u64;
        }
        Ok(received)
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, target: &Url) -> RequestOutcome {
        let start = Instant::now();

        let request = self
            .client
            .request(self.method.clone(), target.clone())
            .header(CONTENT_TYPE, self.content_type.clone())
            .body(self.body.clone());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_error(&e);
                tracing::debug!(url = %target, error = %e, kind = %kind, "Request failed");
                return RequestOutcome::transport(kind, start.elapsed());
            }
        };

        let first_byte = start.elapsed();
        let status = response.status().as_u16();

        if self.print_headers {
            self.print_head(target, &response);
        }

        match self.read_body(response).await {
            Ok(bytes) => {
                let last_byte = start.elapsed();
                tracing::trace!(url = %target, status, bytes, "Request completed");
                RequestOutcome::response(status, last_byte)
                    .with_timings(first_byte, last_byte)
                    .with_bytes(bytes)
            }
            Err(e) => {
                tracing::debug!(url = %target, status, error = %e, "Failed to read response body");
                let mut outcome = RequestOutcome::transport(TransportErrorKind::Body, start.elapsed());
                outcome.first_byte = Some(first_byte);
                outcome
            }
        }
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("method", &self.method)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .field("print_headers", &self.print_headers)
            .field("print_body", &self.print_body)
            .finish()
    }
}
