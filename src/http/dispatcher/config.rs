use std::time::Duration;

/// Floor for the rate-mode worker pool.
pub const MIN_RATE_WORKERS: u64 = 1_000;
/// Estimated mean service time used to size the rate-mode worker pool.
pub const ESTIMATED_SERVICE_TIME: Duration = Duration::from_millis(200);

/// Traffic-shaping discipline. A run has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// `workers` persistent loops, each issuing the next request as soon as
    /// the previous one finishes.
    Concurrency { workers: u64 },
    /// `qps` tokens per second spread over fixed ticks, consumed by a pool
    /// of `max_workers`.
    Rate { qps: u64, max_workers: u64 },
}

impl RunMode {
    /// Rate mode with the worker pool sized from `qps` unless `max_workers`
    /// is given.
    #[must_use]
    pub fn rate(qps: u64, max_workers: Option<u64>) -> Self {
        Self::Rate {
            qps,
            max_workers: max_workers.unwrap_or_else(|| default_max_workers(qps)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub mode: RunMode,
    pub duration: Duration,
    pub request_timeout: Duration,
}

/// `max(1000, qps × 200ms)`.
#[must_use]
pub fn default_max_workers(qps: u64) -> u64 {
    let service_ms = u64::try_from(ESTIMATED_SERVICE_TIME.as_millis()).unwrap_or(u64::MAX);
    let estimated = qps
        .saturating_mul(service_ms)
        .checked_div(1_000)
        .unwrap_or(0);
    estimated.max(MIN_RATE_WORKERS)
}
