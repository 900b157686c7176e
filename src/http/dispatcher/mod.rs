//! Run lifecycle: spawns workers for the configured mode, arms the duration
//! timer and joins everything once the stop signal fires.
mod config;
mod rate;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use crate::error::AppResult;
use crate::shutdown::StopSignal;

pub use config::{
    ESTIMATED_SERVICE_TIME, MIN_RATE_WORKERS, RunConfig, RunMode, default_max_workers,
};
pub use rate::{TICK_INTERVAL, TICKS_PER_SECOND, tick_quotas, token_capacity};
pub use worker::RequestExecutor;

/// An idle dispatcher. [`Dispatcher::start`] consumes it, so a run cannot be
/// started twice.
pub struct Dispatcher {
    config: RunConfig,
    executor: Arc<RequestExecutor>,
    stop: StopSignal,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: RunConfig, executor: RequestExecutor, stop: StopSignal) -> Self {
        Self {
            config,
            executor: Arc::new(executor),
            stop,
        }
    }

    /// Drive traffic until the duration elapses or `stop` fires early, then
    /// wait for every worker and the scheduler to exit.
    ///
    /// Returns the active run time: from start until the stop signal fired.
    ///
    /// # Errors
    ///
    /// Returns an error when a worker task panicked.
    pub async fn start(self) -> AppResult<Duration> {
        let Self {
            config,
            executor,
            stop,
        } = self;
        let timer = spawn_timer(config.duration, stop.clone());

        let handles = match config.mode {
            RunMode::Concurrency { workers } => {
                info!("Starting {} workers for {:?}", workers, config.duration);
                spawn_closed_loop(workers, &executor, &stop)
            }
            RunMode::Rate { qps, max_workers } => {
                info!(
                    "Starting rate mode at {} req/s with {} workers for {:?}",
                    qps, max_workers, config.duration
                );
                spawn_rate(qps, max_workers, &executor, &stop)
            }
        };

        let mut join_result = Ok(());
        for handle in handles {
            if let Err(err) = handle.await {
                stop.fire();
                if join_result.is_ok() {
                    join_result = Err(err);
                }
            }
        }
        stop.fire();
        let active = timer.await?;
        join_result?;

        info!("Run stopped after {:?}", active);
        Ok(active)
    }
}

/// Fires `stop` once `duration` elapsed and yields the time from start until
/// the stop fired, from this timer or from an early signal. Requests still
/// draining after that point do not count towards the run time.
fn spawn_timer(duration: Duration, stop: StopSignal) -> JoinHandle<Duration> {
    let started = Instant::now();
    if duration.is_zero() {
        stop.fire();
    }
    tokio::spawn(async move {
        tokio::select! {
            () = stop.stopped() => {}
            () = tokio::time::sleep(duration) => stop.fire(),
        }
        started.elapsed()
    })
}

fn spawn_closed_loop(
    workers: u64,
    executor: &Arc<RequestExecutor>,
    stop: &StopSignal,
) -> Vec<JoinHandle<()>> {
    (0..workers)
        .map(|_| tokio::spawn(worker::run_closed_loop(Arc::clone(executor), stop.clone())))
        .collect()
}

fn spawn_rate(
    qps: u64,
    max_workers: u64,
    executor: &Arc<RequestExecutor>,
    stop: &StopSignal,
) -> Vec<JoinHandle<()>> {
    let (tx, rx) = flume::bounded(token_capacity(qps));
    let mut handles: Vec<JoinHandle<()>> = (0..max_workers.max(1))
        .map(|_| {
            tokio::spawn(worker::run_token_consumer(
                Arc::clone(executor),
                rx.clone(),
                stop.clone(),
            ))
        })
        .collect();
    handles.push(tokio::spawn(rate::run_scheduler(
        qps,
        tx,
        Arc::clone(executor.stats()),
        stop.clone(),
    )));
    handles
}
