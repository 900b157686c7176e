use std::sync::Arc;

use flume::Receiver;
use tracing::debug;

use crate::http::target::Target;
use crate::http::transport::HttpTransport;
use crate::metrics::{RequestOutcome, StatsAggregator};
use crate::shutdown::StopSignal;
use crate::source::RequestSource;

/// Everything one attempt needs: payload, request shape, transport and the
/// aggregator its outcome lands in.
pub struct RequestExecutor {
    source: Arc<dyn RequestSource>,
    target: Arc<Target>,
    transport: HttpTransport,
    stats: Arc<StatsAggregator>,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(
        source: Arc<dyn RequestSource>,
        target: Arc<Target>,
        transport: HttpTransport,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            source,
            target,
            transport,
            stats,
        }
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    /// Run one attempt and record its outcome.
    pub async fn run_attempt(&self) -> RequestOutcome {
        let outcome = self.attempt().await;
        self.stats.record(&outcome);
        outcome
    }

    async fn attempt(&self) -> RequestOutcome {
        let body = match self.source.generate() {
            Ok(body) => body,
            Err(err) => {
                debug!("Request generation failed: {}", err);
                return RequestOutcome::GenerationFailed;
            }
        };
        let request = match self.target.build_request(body) {
            Ok(request) => request,
            Err(err) => {
                debug!("Failed to build request: {}", err);
                return RequestOutcome::TransportFailed;
            }
        };
        self.transport.execute(request).await
    }
}

/// Concurrency-mode worker: attempt back to back until stopped.
pub(super) async fn run_closed_loop(executor: Arc<RequestExecutor>, stop: StopSignal) {
    while !stop.is_stopped() {
        let outcome = executor.run_attempt().await;
        if !outcome.is_success() {
            // Failures that never reach the network complete without
            // awaiting; give the timer and other workers a turn.
            tokio::task::yield_now().await;
        }
    }
}

/// Rate-mode worker: one attempt per token until stopped or the queue
/// closes.
pub(super) async fn run_token_consumer(
    executor: Arc<RequestExecutor>,
    tokens: Receiver<()>,
    stop: StopSignal,
) {
    loop {
        tokio::select! {
            biased;
            () = stop.stopped() => break,
            token = tokens.recv_async() => {
                if token.is_err() {
                    break;
                }
                executor.run_attempt().await;
            }
        }
    }
}
