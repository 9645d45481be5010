//! Text report rendering

use std::fmt::Write;

use colored::Colorize;
use surge_core::{LatencySummary, Statistics, SUCCESS_STATUS};
use surge_http::ProbeOutcome;

use super::TlsReport;

const LABEL_WIDTH: usize = 43;

fn line(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, " {:.<width$}: {}", label, value, width = LABEL_WIDTH);
}

fn triple(summary: Option<&LatencySummary>) -> String {
    match summary {
        Some(s) => format!(
            "{:.4}, {:.4}, {:.4}",
            s.min.as_secs_f64(),
            s.max.as_secs_f64(),
            s.mean.as_secs_f64()
        ),
        None => "n/a".to_string(),
    }
}

/// Render the statistics of a run
pub fn format_statistics(stats: &Statistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "Results:".bold());

    if stats.interrupted {
        let _ = writeln!(out, " {}", "Run interrupted, results are partial".yellow());
    }

    if stats.is_degenerate() {
        let _ = writeln!(out, " {}", "No requests completed".yellow());
        return out;
    }

    line(&mut out, "Total Requests", stats.total_requests.to_string().bold());
    line(
        &mut out,
        "Succeeded Requests (2XX)",
        stats.succeeded_requests.to_string().green().bold(),
    );
    let failed = stats.failed_requests.to_string();
    line(
        &mut out,
        "Failed Requests",
        if stats.failed_requests > 0 {
            failed.red().bold()
        } else {
            failed.normal()
        },
    );
    if stats.transport_failures > 0 {
        line(&mut out, "  Transport Errors", stats.transport_failures);
    }
    if stats.cancelled_requests > 0 {
        line(&mut out, "  Cancelled", stats.cancelled_requests);
    }
    line(
        &mut out,
        "Success Rate (%)",
        format!("{:.2}", stats.success_rate() * 100.0),
    );
    line(
        &mut out,
        "Requests/second",
        format!("{:.2}", stats.requests_per_second),
    );
    line(&mut out, "Bytes Received", stats.bytes_received);
    line(
        &mut out,
        "Wall Clock (s)",
        format!("{:.4}", stats.wall_clock.as_secs_f64()),
    );

    out.push('\n');
    line(
        &mut out,
        "Total Request Time (s) (Min, Max, Mean)",
        triple(stats.total_time.as_ref()),
    );
    line(
        &mut out,
        "Time to First Byte (s) (Min, Max, Mean)",
        triple(stats.time_to_first_byte.as_ref()),
    );
    line(
        &mut out,
        "Time to Last Byte (s) (Min, Max, Mean)",
        triple(stats.time_to_last_byte.as_ref()),
    );

    if !stats.status_counts.is_empty() {
        let _ = writeln!(out, "\n{}", "Status Codes:".bold());
        for (code, count) in &stats.status_counts {
            let code = if SUCCESS_STATUS.contains(code) {
                code.to_string().green()
            } else {
                code.to_string().red()
            };
            let _ = writeln!(out, "  {}: {}", code, count);
        }
    }

    if stats.targets.len() > 1 {
        let _ = writeln!(out, "\n{}", "Targets:".bold());
        for target in &stats.targets {
            let mean = target
                .total_time
                .map(|t| format!("{:.4} s", t.mean.as_secs_f64()))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "  {}  requests: {}, failed: {}, mean: {}",
                target.url, target.total_requests, target.failed_requests, mean
            );
        }
    }

    out
}

/// Render TLS probe results, one line per version
pub fn format_tls_reports(reports: &[TlsReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "Verifying TLS".bold());

    if reports.is_empty() {
        let _ = writeln!(out, " {}", "No https targets to probe".yellow());
        return out;
    }

    for report in reports {
        let _ = writeln!(out, " {}", report.url);
        for result in &report.results {
            let outcome = match &result.outcome {
                ProbeOutcome::Status(_) => result.outcome.to_string().green(),
                ProbeOutcome::Unsupported(_) => result.outcome.to_string().yellow(),
                ProbeOutcome::Failed(_) => result.outcome.to_string().red(),
            };
            let _ = writeln!(
                out,
                "  {}: {} ({:.4} s)",
                result.version,
                outcome,
                result.elapsed.as_secs_f64()
            );
        }
    }

    out
}
