//! Run configuration types

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Method;
use url::Url;

/// Content type sent when none is configured
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Immutable input of a single benchmark run
///
/// Built once from validated CLI input and then shared (behind an `Arc`) by
/// the dispatcher and every request task. Nothing mutates it after
/// [`RunConfig::validate`] has passed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target URLs; `requests_per_target` requests are sent to each
    pub targets: Vec<Url>,

    /// HTTP method
    pub method: Method,

    /// Value of the `Content-Type` request header
    pub content_type: String,

    /// Request body (may be empty)
    pub body: String,

    /// Print the status line and headers of every response
    pub print_headers: bool,

    /// Print the response body (only honoured for single-request runs)
    pub print_body: bool,

    /// Number of requests issued per target (`N`)
    pub requests_per_target: usize,

    /// Maximum number of requests in flight across all targets (`C`)
    pub concurrency: usize,

    /// Per-request timeout; `None` leaves the client default
    pub timeout: Option<Duration>,

    /// Skip TLS certificate verification
    pub insecure: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            method: Method::GET,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: String::new(),
            print_headers: false,
            print_body: false,
            requests_per_target: 1,
            concurrency: 1,
            timeout: None,
            insecure: false,
        }
    }
}

impl RunConfig {
    /// Create a config for the given targets with default settings
    pub fn new(targets: Vec<Url>) -> Self {
        Self {
            targets,
            ..Default::default()
        }
    }

    /// Create a config for a single target
    pub fn single(target: Url) -> Self {
        Self::new(vec![target])
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the request content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the number of requests per target
    pub fn with_requests(mut self, requests_per_target: usize) -> Self {
        self.requests_per_target = requests_per_target;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Toggle response header printing
    pub fn with_print_headers(mut self, enabled: bool) -> Self {
        self.print_headers = enabled;
        self
    }

    /// Toggle response body printing
    pub fn with_print_body(mut self, enabled: bool) -> Self {
        self.print_body = enabled;
        self
    }

    /// Toggle TLS certificate verification
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Total number of request tasks the run will launch
    pub fn total_requests(&self) -> usize {
        self.targets.len().saturating_mul(self.requests_per_target)
    }

    /// Whether response bodies will actually be printed
    ///
    /// Printing many bodies concurrently interleaves them, so it is refused
    /// unless the whole run issues at most one request.
    pub fn body_printing_enabled(&self) -> bool {
        self.print_body && self.total_requests() <= 1
    }

    /// Validate the configuration
    ///
    /// An empty target list or `requests_per_target == 0` is accepted and
    /// produces a degenerate run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
        }

        if reqwest::header::HeaderValue::from_str(&self.content_type).is_err() {
            return Err(ConfigError::InvalidContentType(self.content_type.clone()));
        }

        for target in &self.targets {
            check_target(target)?;
        }

        Ok(())
    }

    /// Resolve every distinct target host
    ///
    /// Called before dispatch so that an unresolvable host is reported as a
    /// configuration error instead of N failed requests.
    pub async fn resolve_hosts(&self) -> Result<(), ConfigError> {
        let endpoints: BTreeSet<(String, u16)> = self
            .targets
            .iter()
            .filter_map(|target| {
                let host = target.host_str()?.to_string();
                let port = target.port_or_known_default()?;
                Some((host, port))
            })
            .collect();

        for (host, port) in endpoints {
            let resolved = tokio::net::lookup_host((host.as_str(), port))
                .await
                .map_err(|e| ConfigError::UnresolvableHost {
                    host: host.clone(),
                    reason: e.to_string(),
                })?
                .next()
                .is_some();

            if !resolved {
                return Err(ConfigError::UnresolvableHost {
                    host,
                    reason: "no addresses returned".into(),
                });
            }
            tracing::debug!(host = %host, port, "Resolved target host");
        }

        Ok(())
    }
}

/// Parse and check a single target URL
pub fn parse_target(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingTarget);
    }

    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;
    check_target(&url)?;
    Ok(url)
}

fn check_target(url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::UnsupportedScheme {
                url: url.to_string(),
                scheme: other.to_string(),
            })
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::MissingHost(url.to_string()));
    }

    Ok(())
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No target URL was supplied
    #[error("a target URL is required")]
    MissingTarget,

    /// Target URL could not be parsed
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Raw input
        url: String,
        /// Parser message
        reason: String,
    },

    /// Target URL uses a scheme other than http/https
    #[error("unsupported scheme '{scheme}' in '{url}' (expected http or https)")]
    UnsupportedScheme {
        /// Offending URL
        url: String,
        /// Its scheme
        scheme: String,
    },

    /// Target URL has no host
    #[error("URL '{0}' has no host")]
    MissingHost(String),

    /// Target host did not resolve
    #[error("cannot resolve host '{host}': {reason}")]
    UnresolvableHost {
        /// Host name
        host: String,
        /// Resolver message
        reason: String,
    },

    /// Concurrency must be at least one
    #[error("invalid concurrency {0}: must be at least 1")]
    InvalidConcurrency(usize),

    /// Timeout must be positive
    #[error("invalid timeout {0:?}: must be greater than zero")]
    InvalidTimeout(Duration),

    /// Content type is not a valid header value
    #[error("invalid content type '{0}'")]
    InvalidContentType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.method, Method::GET);
        assert_eq!(config.content_type, "text/plain");
        assert_eq!(config.requests_per_target, 1);
        assert_eq!(config.concurrency, 1);
        assert!(config.timeout.is_none());
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = RunConfig::single(url("http://localhost:8080/"))
            .with_method(Method::POST)
            .with_content_type("application/json")
            .with_body("{}")
            .with_requests(50)
            .with_concurrency(5)
            .with_timeout(Duration::from_secs(2));

        assert_eq!(config.method, Method::POST);
        assert_eq!(config.body, "{}");
        assert_eq!(config.total_requests(), 50);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.timeout, Some(Duration::from_secs(2)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_total_requests_list_mode() {
        let config = RunConfig::new(vec![url("http://a.test/"), url("http://b.test/")])
            .with_requests(10);
        assert_eq!(config.total_requests(), 20);
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let config = RunConfig::single(url("http://localhost/")).with_concurrency(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let config = RunConfig::single(url("http://localhost/")).with_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_validation_accepts_degenerate_runs() {
        assert!(RunConfig::new(Vec::new()).validate().is_ok());
        assert!(RunConfig::single(url("http://localhost/"))
            .with_requests(0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_content_type() {
        let config = RunConfig::single(url("http://localhost/")).with_content_type("text/plain\n");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidContentType(_))
        ));
    }

    #[test]
    fn test_validation_rejects_foreign_scheme() {
        let config = RunConfig::single(url("ftp://files.test/pub"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_body_printing_only_for_single_request() {
        let single = RunConfig::single(url("http://localhost/")).with_print_body(true);
        assert!(single.body_printing_enabled());

        let many = single.clone().with_requests(2);
        assert!(!many.body_printing_enabled());

        let off = RunConfig::single(url("http://localhost/"));
        assert!(!off.body_printing_enabled());
    }

    #[test]
    fn test_parse_target() {
        let parsed = parse_target("  https://example.com/path?q=1 ").unwrap();
        assert_eq!(parsed.host_str(), Some("example.com"));

        assert!(matches!(parse_target(""), Err(ConfigError::MissingTarget)));
        assert!(matches!(
            parse_target("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_target("mailto:someone@example.com"),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let config = RunConfig::single(url("http://127.0.0.1:9/"));
        assert!(config.resolve_hosts().await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_stops_at_first_unresolvable_host() {
        let config = RunConfig::new(vec![
            url("http://127.0.0.1:9/"),
            url("http://127.0.0.1:9/other"),
            url("https://surge-missing.invalid/"),
        ]);

        match config.resolve_hosts().await {
            Err(ConfigError::UnresolvableHost { host, .. }) => {
                assert_eq!(host, "surge-missing.invalid");
            }
            other => panic!("expected unresolvable host, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_host() {
        let config = RunConfig::single(url("http://surge-does-not-exist.invalid/"));
        assert!(matches!(
            config.resolve_hosts().await,
            Err(ConfigError::UnresolvableHost { .. })
        ));
    }
}
