use std::sync::Arc;
use std::time::Duration;

use flume::{Sender, TrySendError};
use tokio::time::interval;
use tracing::debug;

use crate::metrics::StatsAggregator;
use crate::shutdown::StopSignal;

pub const TICKS_PER_SECOND: u64 = 50;
pub const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Token quotas for the ticks of one second.
///
/// The first `qps % 50` ticks carry one extra token, so the quotas always
/// sum to `qps`.
#[must_use]
pub fn tick_quotas(qps: u64) -> Vec<u64> {
    let (base, remainder) = div_mod_u64(qps, TICKS_PER_SECOND);
    (0..TICKS_PER_SECOND)
        .map(|tick| {
            if tick < remainder {
                base.saturating_add(1)
            } else {
                base
            }
        })
        .collect()
}

/// Queue capacity for rate mode: two seconds' worth of tokens.
#[must_use]
pub fn token_capacity(qps: u64) -> usize {
    usize::try_from(qps.saturating_mul(2))
        .unwrap_or(usize::MAX)
        .max(1)
}

/// Push each tick's quota into the token queue until `stop` fires.
///
/// Never blocks on the queue: a token that does not fit is dropped and
/// counted as an error.
pub(super) async fn run_scheduler(
    qps: u64,
    tokens: Sender<()>,
    stats: Arc<StatsAggregator>,
    stop: StopSignal,
) {
    let quotas = tick_quotas(qps);
    let mut ticker = interval(TICK_INTERVAL);
    let mut issued: u64 = 0;
    let mut dropped: u64 = 0;

    'ticks: for quota in quotas.iter().cycle() {
        tokio::select! {
            biased;
            () = stop.stopped() => break,
            _ = ticker.tick() => {}
        }
        for _ in 0..*quota {
            match tokens.try_send(()) {
                Ok(()) => issued = issued.saturating_add(1),
                Err(TrySendError::Full(())) => {
                    dropped = dropped.saturating_add(1);
                    stats.record_dropped();
                }
                Err(TrySendError::Disconnected(())) => break 'ticks,
            }
        }
    }
    debug!("Scheduler stopped: {} tokens issued, {} dropped", issued, dropped);
}

fn div_mod_u64(value: u64, divisor: u64) -> (u64, u64) {
    if divisor == 0 {
        return (0, 0);
    }
    let div = value.checked_div(divisor).unwrap_or(0);
    let rem = value.checked_rem(divisor).unwrap_or(0);
    (div, rem)
}
