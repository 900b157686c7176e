use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::Service;

use crate::error::ConnectionError;

use super::ConnectionManager;

const DEFAULT_HTTP_PORT: u16 = 80;

type ConnectFuture =
    Pin<Box<dyn Future<Output = Result<TokioIo<TcpStream>, ConnectionError>> + Send>>;

/// Connector handed to the pooled hyper client; every new connection goes
/// through [`ConnectionManager::dial_with_retry`].
#[derive(Clone)]
pub struct ManagedConnector {
    manager: Arc<ConnectionManager>,
}

impl ManagedConnector {
    #[must_use]
    pub const fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl Service<Uri> for ManagedConnector {
    type Response = TokioIo<TcpStream>;
    type Error = ConnectionError;
    type Future = ConnectFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let manager = Arc::clone(&self.manager);
        Box::pin(async move {
            let host = uri
                .host()
                .ok_or_else(|| ConnectionError::MissingHost {
                    uri: uri.to_string(),
                })?
                .to_owned();
            let port = uri.port_u16().unwrap_or(DEFAULT_HTTP_PORT);
            let stream = manager.dial_with_retry(&host, port).await?;
            Ok(TokioIo::new(stream))
        })
    }
}
