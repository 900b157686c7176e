//! Run statistics: lock-free cumulative counters, the rotating interval
//! window and its periodic reporter.
mod histogram;
mod percentile;
mod reporter;
mod stats;
mod types;


pub use histogram::LatencyHistogram;
pub use reporter::{
    CsvIntervalSink, INTERVAL_CSV_HEADER, IntervalReporter, IntervalSink, LogIntervalSink,
};
pub use stats::StatsAggregator;
pub use types::{AggregateStats, IntervalSnapshot, RequestOutcome, RunSummary};
