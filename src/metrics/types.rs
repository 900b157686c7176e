use std::time::Duration;

use chrono::{DateTime, Local};

/// Result of a single request attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success { latency: Duration, bytes: u64 },
    GenerationFailed,
    DialFailed,
    TransportFailed,
    Timeout,
    BadStatus { status: u16 },
}

impl RequestOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Point-in-time copy of the cumulative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub timeout_requests: u64,
    pub dropped_tokens: u64,
    pub total_bytes: u64,
    pub total_latency: Duration,
    pub min_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
}

/// Statistics for one reporting interval.
#[derive(Debug, Clone)]
pub struct IntervalSnapshot {
    pub timestamp: DateTime<Local>,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency: Duration,
    pub p75_latency: Duration,
    pub p90_latency: Duration,
    pub p99_latency: Duration,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub duration: Duration,
    pub totals: AggregateStats,
    pub requests_per_sec_x100: u64,
    pub avg_latency: Option<Duration>,
    pub p50_latency: Duration,
    pub p90_latency: Duration,
    pub p99_latency: Duration,
}
