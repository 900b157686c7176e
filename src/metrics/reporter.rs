use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{info, warn};

use crate::error::MetricsError;
use crate::shutdown::StopSignal;

use super::stats::StatsAggregator;
use super::types::IntervalSnapshot;

pub const INTERVAL_CSV_HEADER: &str =
    "timestamp,request_count,error_count,avg_latency_ms,p75_ms,p90_ms,p99_ms";

/// Destination for per-interval statistics.
#[async_trait]
pub trait IntervalSink: Send {
    /// Write one interval row.
    ///
    /// # Errors
    ///
    /// Returns an error when the row cannot be delivered.
    async fn write(&mut self, snapshot: &IntervalSnapshot) -> Result<(), MetricsError>;

    /// Flush and release the destination.
    ///
    /// # Errors
    ///
    /// Returns an error when buffered data cannot be flushed.
    async fn close(&mut self) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Appends one CSV row per interval, syncing after every row.
pub struct CsvIntervalSink {
    path: PathBuf,
    file: tokio::fs::File,
}

impl CsvIntervalSink {
    /// Create (truncate) the stats file and write the header.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or written.
    pub async fn create(path: &Path) -> Result<Self, MetricsError> {
        let mut file =
            tokio::fs::File::create(path)
                .await
                .map_err(|err| MetricsError::OpenStatsFile {
                    path: path.to_path_buf(),
                    source: err,
                })?;
        file.write_all(format!("{}\n", INTERVAL_CSV_HEADER).as_bytes())
            .await
            .map_err(|err| MetricsError::Io {
                context: "write stats header",
                source: err,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IntervalSink for CsvIntervalSink {
    async fn write(&mut self, snapshot: &IntervalSnapshot) -> Result<(), MetricsError> {
        self.file
            .write_all(csv_row(snapshot).as_bytes())
            .await
            .map_err(|err| MetricsError::Io {
                context: "write stats row",
                source: err,
            })?;
        self.file.sync_data().await.map_err(|err| MetricsError::Io {
            context: "sync stats file",
            source: err,
        })
    }

    async fn close(&mut self) -> Result<(), MetricsError> {
        self.file.flush().await.map_err(|err| MetricsError::Io {
            context: "flush stats file",
            source: err,
        })
    }
}

/// Logs each interval through `tracing`.
#[derive(Debug, Default)]
pub struct LogIntervalSink;

#[async_trait]
impl IntervalSink for LogIntervalSink {
    async fn write(&mut self, snapshot: &IntervalSnapshot) -> Result<(), MetricsError> {
        info!(
            requests = snapshot.request_count,
            errors = snapshot.error_count,
            avg_ms = snapshot.avg_latency.as_millis(),
            p75_ms = snapshot.p75_latency.as_millis(),
            p90_ms = snapshot.p90_latency.as_millis(),
            p99_ms = snapshot.p99_latency.as_millis(),
            "interval"
        );
        Ok(())
    }
}

pub(crate) fn csv_row(snapshot: &IntervalSnapshot) -> String {
    format!(
        "{},{},{},{},{},{},{}\n",
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
        snapshot.request_count,
        snapshot.error_count,
        snapshot.avg_latency.as_millis(),
        snapshot.p75_latency.as_millis(),
        snapshot.p90_latency.as_millis(),
        snapshot.p99_latency.as_millis()
    )
}

/// Periodically drains the aggregator's interval window into a sink.
pub struct IntervalReporter {
    stats: Arc<StatsAggregator>,
    sink: Box<dyn IntervalSink>,
    period: Duration,
    rows_written: u64,
}

impl IntervalReporter {
    #[must_use]
    pub fn new(stats: Arc<StatsAggregator>, sink: Box<dyn IntervalSink>, period: Duration) -> Self {
        Self {
            stats,
            sink,
            period,
            rows_written: 0,
        }
    }

    /// Flush one snapshot per period until `stop` fires, then hand the
    /// reporter back for the final flush.
    pub async fn run(mut self, stop: StopSignal) -> Self {
        let period = self.period.max(Duration::from_millis(1));
        let start = tokio::time::Instant::now()
            .checked_add(period)
            .unwrap_or_else(tokio::time::Instant::now);
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stop.stopped() => break,
                _ = ticker.tick() => self.flush_once().await,
            }
        }
        self
    }

    /// Emit the trailing partial interval and close the sink.
    ///
    /// # Errors
    ///
    /// Returns an error when the sink cannot be flushed.
    pub async fn finish(mut self) -> Result<u64, MetricsError> {
        self.flush_once().await;
        self.sink.close().await?;
        Ok(self.rows_written)
    }

    async fn flush_once(&mut self) {
        let Some(snapshot) = self.stats.snapshot() else {
            return;
        };
        match self.sink.write(&snapshot).await {
            Ok(()) => self.rows_written = self.rows_written.saturating_add(1),
            Err(err) => warn!("Failed to write interval stats: {}", err),
        }
    }
}
