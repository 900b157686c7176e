use std::time::Duration;

use crate::metrics::RunSummary;

/// Microseconds per millisecond.
const US_PER_MS: u128 = 1_000;

pub(crate) fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let totals = &summary.totals;
    let mut lines = vec![
        format!("Duration: {}", format_latency(summary.duration)),
        format!("Total Requests: {}", totals.total_requests),
        format!("Failed Requests: {}", totals.failed_requests),
        format!("Timeouts: {}", totals.timeout_requests),
        format!("Dropped Tokens: {}", totals.dropped_tokens),
        format!(
            "Requests/sec: {}.{:02}",
            summary.requests_per_sec_x100 / 100,
            summary.requests_per_sec_x100 % 100
        ),
        format!("Total Bytes: {}", totals.total_bytes),
    ];

    match (totals.min_latency, totals.max_latency, summary.avg_latency) {
        (Some(min), Some(max), Some(avg)) => {
            lines.push(format!(
                "Latency min/avg/max: {} / {} / {}",
                format_latency(min),
                format_latency(avg),
                format_latency(max)
            ));
            lines.push(format!(
                "Latency p50/p90/p99: {} / {} / {}",
                format_latency(summary.p50_latency),
                format_latency(summary.p90_latency),
                format_latency(summary.p99_latency)
            ));
        }
        _ => lines.push("No successful requests; latency stats unavailable.".to_owned()),
    }
    lines
}

pub(crate) fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

/// Milliseconds with three decimals, e.g. `12.345ms`.
pub(crate) fn format_latency(value: Duration) -> String {
    let micros = value.as_micros();
    format!(
        "{}.{:03}ms",
        micros.checked_div(US_PER_MS).unwrap_or(0),
        micros.checked_rem(US_PER_MS).unwrap_or(0)
    )
}
