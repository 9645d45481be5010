//! CLI argument parsing and run orchestration

mod render;
mod targets;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use serde::Serialize;
use surge_core::{
    parse_target, ChannelConfig, ConfigError, DispatcherBuilder, Method, RunConfig, Statistics,
    DEFAULT_CONTENT_TYPE,
};
use surge_http::{HttpExecutor, TlsProbeResult, TlsProber};
use url::Url;

/// surge - a simple HTTP benchmarking and load testing tool
#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// HTTP method
    #[arg(short, long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Target URL, e.g. http://localhost:8080 or https://example.com
    #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
    pub url: Option<String>,

    /// File with one target URL per line (blank lines and # comments skipped)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Content-Type header of every request
    #[arg(long, alias = "con-type", default_value = DEFAULT_CONTENT_TYPE)]
    pub content_type: String,

    /// Request body
    #[arg(long, default_value = "")]
    pub content: String,

    /// Print the response body (single-request runs only)
    #[arg(long)]
    pub res_body: bool,

    /// Print the status line and headers of every response
    #[arg(short = 'H', long)]
    pub headers: bool,

    /// Number of requests per target
    #[arg(short = 'n', long, default_value_t = 1, env = "SURGE_REQUESTS")]
    pub requests: usize,

    /// Maximum number of requests in flight
    #[arg(short, long, default_value_t = 1, env = "SURGE_CONCURRENCY")]
    pub concurrency: usize,

    /// Probe which TLS versions each https target accepts after the run
    #[arg(long)]
    pub tls: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "SURGE_TIMEOUT", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Stop launching requests and cancel in-flight ones after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    pub deadline: Option<Duration>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Print the results as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// TLS probe results for one target
#[derive(Debug, Serialize)]
pub struct TlsReport {
    /// Probed URL
    pub url: String,
    /// One entry per TLS version, oldest first
    pub results: Vec<TlsProbeResult>,
}

/// Everything `--json` prints
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    statistics: &'a Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<&'a [TlsReport]>,
}

impl Cli {
    /// Run the benchmark described by the arguments
    pub async fn run(self) -> Result<()> {
        let config = match self.checked_config().await {
            Ok(config) => config,
            Err(e) => usage_error(&e).exit(),
        };

        if self.res_body && !config.body_printing_enabled() {
            tracing::warn!(
                total_requests = config.total_requests(),
                "--res-body only applies to single-request runs, response bodies will not be printed"
            );
        }

        let executor = HttpExecutor::new(&config).context("failed to build HTTP client")?;
        let total = config.total_requests();
        let (dispatcher, outcomes) = DispatcherBuilder::new()
            .config(config.clone())
            .executor(Arc::new(executor))
            .channel_config(ChannelConfig::for_requests(total))
            .build()
            .context("failed to set up dispatcher")?;

        let stats = match self.deadline {
            Some(deadline) => dispatcher.run_with_deadline(outcomes, deadline).await,
            None => dispatcher.run_with_signal_handling(outcomes).await,
        }
        .context("benchmark run failed")?;

        let tls = if self.tls {
            self.probe_tls(&config.targets).await
        } else {
            Vec::new()
        };

        if self.json {
            let report = JsonReport {
                statistics: &stats,
                tls: self.tls.then_some(tls.as_slice()),
            };
            let json = serde_json::to_string_pretty(&report).context("failed to encode results")?;
            println!("{}", json);
        } else {
            print!("{}", render::format_statistics(&stats));
            if self.tls {
                print!("{}", render::format_tls_reports(&tls));
            }
        }

        Ok(())
    }

    /// Build, validate and resolve the run configuration
    async fn checked_config(&self) -> Result<RunConfig> {
        let config = self.run_config()?;

        config.validate().context("invalid run configuration")?;
        config
            .resolve_hosts()
            .await
            .context("failed to resolve target host")?;

        Ok(config)
    }

    /// Translate the arguments into a [`RunConfig`]
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::new(self.targets()?)
            .with_method(self.method.clone())
            .with_content_type(self.content_type.clone())
            .with_body(self.content.clone())
            .with_requests(self.requests)
            .with_concurrency(self.concurrency)
            .with_print_headers(self.headers)
            .with_print_body(self.res_body)
            .with_insecure(self.insecure);

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        Ok(config)
    }

    fn targets(&self) -> Result<Vec<Url>> {
        match (&self.url, &self.file) {
            (Some(raw), _) => {
                let url = parse_target(raw).with_context(|| format!("invalid --url '{}'", raw))?;
                Ok(vec![url])
            }
            (None, Some(path)) => targets::read_url_list(path),
            (None, None) => Err(ConfigError::MissingTarget.into()),
        }
    }

    /// Probe every distinct https target, one after another
    async fn probe_tls(&self, targets: &[Url]) -> Vec<TlsReport> {
        let mut seen = BTreeSet::new();
        let mut reports = Vec::new();

        for target in targets {
            if !seen.insert(target.as_str()) {
                continue;
            }

            let prober = match TlsProber::new(target.clone()) {
                Ok(prober) => prober.timeout(self.timeout).insecure(self.insecure),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping TLS probe");
                    continue;
                }
            };

            tracing::info!(url = %target, "Verifying TLS versions");
            reports.push(TlsReport {
                url: target.to_string(),
                results: prober.probe_all().await,
            });
        }

        reports
    }
}

/// Render a configuration failure the way clap reports bad arguments
fn usage_error(err: &anyhow::Error) -> clap::Error {
    Cli::command().error(ErrorKind::ValueValidation, format!("{:#}", err))
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid HTTP method '{}': {}", raw, e))
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", raw))?;

    if secs <= 0.0 {
        return Err(format!("'{}' must be greater than zero", raw));
    }

    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{}': {}", raw, e))
}
