use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;
use tracing::debug;

use crate::metrics::RequestOutcome;

use super::connection::{ConnectionManager, ManagedConnector};

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const POOL_MAX_IDLE_PER_HOST: usize = 10_000;

enum Failure {
    Client(hyper_util::client::legacy::Error),
    Body(hyper::Error),
}

/// Pooled HTTP client whose new connections are dialed by the
/// [`ConnectionManager`]. One instance is built per run and shared by all
/// workers.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<ManagedConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpTransport {
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, timeout: Duration, http2_only: bool) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .http2_only(http2_only)
            .build(ManagedConnector::new(manager));
        Self { client, timeout }
    }

    /// Send `request` and drain the response under the per-request deadline.
    ///
    /// The deadline is independent of the run's stop signal, so an attempt in
    /// flight when the run stops still completes or times out.
    pub async fn execute(&self, request: Request<Full<Bytes>>) -> RequestOutcome {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.send(request)).await;
        let latency = started.elapsed();

        match result {
            Err(_elapsed) => {
                debug!("Request timed out after {:?}", self.timeout);
                RequestOutcome::Timeout
            }
            Ok(Err(Failure::Client(err))) if err.is_connect() => {
                debug!("Dial failed: {}", err);
                RequestOutcome::DialFailed
            }
            Ok(Err(Failure::Client(err))) => {
                debug!("Request failed: {}", err);
                RequestOutcome::TransportFailed
            }
            Ok(Err(Failure::Body(err))) => {
                debug!("Failed to read response body: {}", err);
                RequestOutcome::TransportFailed
            }
            Ok(Ok((status, _bytes))) if !status.is_success() => {
                debug!("Unexpected status {}", status);
                RequestOutcome::BadStatus {
                    status: status.as_u16(),
                }
            }
            Ok(Ok((_status, bytes))) => RequestOutcome::Success { latency, bytes },
        }
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<(http::StatusCode, u64), Failure> {
        let response = self.client.request(request).await.map_err(Failure::Client)?;
        let status = response.status();
        let bytes = drain_response_body(response.into_body())
            .await
            .map_err(Failure::Body)?;
        Ok((status, bytes))
    }
}

async fn drain_response_body(mut body: Incoming) -> Result<u64, hyper::Error> {
    let mut total_bytes: u64 = 0;
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame?.into_data() {
            total_bytes = total_bytes.saturating_add(u64::try_from(data.len()).unwrap_or(u64::MAX));
        }
    }
    Ok(total_bytes)
}
