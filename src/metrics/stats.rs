use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Local;
use tracing::warn;

use super::histogram::LatencyHistogram;
use super::percentile::{average, nearest_rank};
use super::types::{AggregateStats, IntervalSnapshot, RequestOutcome, RunSummary};

/// Sentinel stored in `min_latency_ns` until the first success lands.
const NO_MIN: u64 = u64::MAX;
/// Independent run-wide histograms, merged in `finalize`.
const HISTOGRAM_SHARDS: usize = 16;

/// Shared statistics for one run.
///
/// Cumulative counters are plain atomics and the latency extrema use
/// compare-and-swap loops. The run-wide histogram is split into shards that
/// successes pick round-robin, so concurrent recorders rarely meet on the
/// same lock. The interval sample buffer has its own mutex, drained by
/// `snapshot`, and is only touched when interval samples are collected.
pub struct StatsAggregator {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    timeout_requests: AtomicU64,
    dropped_tokens: AtomicU64,
    total_bytes: AtomicU64,
    total_latency_ns: AtomicU64,
    min_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
    interval_errors: AtomicU64,
    collect_samples: bool,
    window: Mutex<Vec<Duration>>,
    histograms: Vec<Mutex<LatencyHistogram>>,
    next_shard: AtomicUsize,
}

impl StatsAggregator {
    /// `collect_samples` controls whether successes are buffered for
    /// interval snapshots; without a reporter the buffer would only grow.
    #[must_use]
    pub fn new(collect_samples: bool) -> Self {
        let histograms = match (0..HISTOGRAM_SHARDS)
            .map(|_| LatencyHistogram::new().map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(shards) => shards,
            Err(err) => {
                warn!("Failed to initialize latency histogram: {}", err);
                Vec::new()
            }
        };
        Self {
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            timeout_requests: AtomicU64::new(0),
            dropped_tokens: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            min_latency_ns: AtomicU64::new(NO_MIN),
            max_latency_ns: AtomicU64::new(0),
            interval_errors: AtomicU64::new(0),
            collect_samples,
            window: Mutex::new(Vec::new()),
            histograms,
            next_shard: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        match *outcome {
            RequestOutcome::Success { latency, bytes } => self.record_success(latency, bytes),
            RequestOutcome::Timeout => {
                self.timeout_requests.fetch_add(1, Ordering::Relaxed);
                self.record_error();
            }
            RequestOutcome::GenerationFailed
            | RequestOutcome::DialFailed
            | RequestOutcome::TransportFailed
            | RequestOutcome::BadStatus { .. } => self.record_error(),
        }
    }

    pub fn record_success(&self, latency: Duration, bytes: u64) {
        let nanos = duration_to_nanos(latency);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(nanos, Ordering::Relaxed);
        lower_to(&self.min_latency_ns, nanos);
        raise_to(&self.max_latency_ns, nanos);
        self.record_latency(latency);
    }

    /// Add a latency sample to the run-wide histogram and, when interval
    /// samples are collected, to the current interval.
    pub fn record_latency(&self, latency: Duration) {
        if self.collect_samples {
            self.lock_window().push(latency);
        }
        let Some(index) = self
            .next_shard
            .fetch_add(1, Ordering::Relaxed)
            .checked_rem(self.histograms.len())
        else {
            return;
        };
        if let Some(shard) = self.histograms.get(index)
            && let Err(err) = lock(shard).record(latency)
        {
            warn!("Failed to record latency: {}", err);
        }
    }

    /// Count a failure both cumulatively and for the current interval.
    pub fn record_error(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.interval_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A rate-mode token that could not be queued.
    pub fn record_dropped(&self) {
        self.dropped_tokens.fetch_add(1, Ordering::Relaxed);
        self.record_error();
    }

    /// Drain the interval window.
    ///
    /// Returns `None` when no success was recorded since the previous
    /// snapshot; the interval error count is left in place for the next one.
    pub fn snapshot(&self) -> Option<IntervalSnapshot> {
        let mut window = self.lock_window();
        if window.is_empty() {
            return None;
        }

        window.sort_unstable();
        let samples = window.as_slice();
        let snapshot = IntervalSnapshot {
            timestamp: Local::now(),
            request_count: u64::try_from(samples.len()).unwrap_or(u64::MAX),
            error_count: self.interval_errors.swap(0, Ordering::Relaxed),
            avg_latency: average(samples),
            p75_latency: nearest_rank(samples, 75),
            p90_latency: nearest_rank(samples, 90),
            p99_latency: nearest_rank(samples, 99),
        };
        window.clear();
        Some(snapshot)
    }

    #[must_use]
    pub fn totals(&self) -> AggregateStats {
        let min = self.min_latency_ns.load(Ordering::Relaxed);
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let has_success = total_requests > 0 && min != NO_MIN;
        AggregateStats {
            total_requests,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            timeout_requests: self.timeout_requests.load(Ordering::Relaxed),
            dropped_tokens: self.dropped_tokens.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_latency: Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed)),
            min_latency: has_success.then(|| Duration::from_nanos(min)),
            max_latency: has_success
                .then(|| Duration::from_nanos(self.max_latency_ns.load(Ordering::Relaxed))),
        }
    }

    /// Final figures once every worker has joined.
    #[must_use]
    pub fn finalize(&self, duration: Duration) -> RunSummary {
        let totals = self.totals();
        let requests_per_sec_x100 = rate_x100(totals.total_requests, duration);
        let avg_latency = u32::try_from(totals.total_requests)
            .ok()
            .filter(|count| *count > 0)
            .and_then(|count| totals.total_latency.checked_div(count));
        let (p50_latency, p90_latency, p99_latency) = self
            .merged_histogram()
            .map_or((Duration::ZERO, Duration::ZERO, Duration::ZERO), |hist| {
                hist.percentiles()
            });
        RunSummary {
            duration,
            totals,
            requests_per_sec_x100,
            avg_latency,
            p50_latency,
            p90_latency,
            p99_latency,
        }
    }

    /// All histogram shards folded into one.
    pub(crate) fn merged_histogram(&self) -> Option<LatencyHistogram> {
        let mut merged = match LatencyHistogram::new() {
            Ok(histogram) => histogram,
            Err(err) => {
                warn!("Failed to merge latency histograms: {}", err);
                return None;
            }
        };
        for shard in &self.histograms {
            if let Err(err) = merged.merge(&lock(shard)) {
                warn!("Failed to merge latency histograms: {}", err);
                return None;
            }
        }
        Some(merged)
    }

    fn lock_window(&self) -> MutexGuard<'_, Vec<Duration>> {
        lock(&self.window)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new(true)
    }
}

fn duration_to_nanos(latency: Duration) -> u64 {
    u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX)
}

fn lower_to(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value < current {
        match slot.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

fn raise_to(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value > current {
        match slot.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Requests per second scaled by 100; zero for an empty duration.
pub(crate) fn rate_x100(count: u64, duration: Duration) -> u64 {
    let millis = duration.as_millis();
    if millis == 0 {
        return 0;
    }
    let scaled = u128::from(count)
        .saturating_mul(100_000)
        .checked_div(millis)
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}
