//! DNS-caching, retrying TCP dialer shared by every worker.
mod connector;
mod dns;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, warn};

use crate::error::ConnectionError;

pub use connector::ManagedConnector;
pub use dns::{DEFAULT_DNS_TTL, DnsCache, Resolver, SystemResolver};

/// Full passes over the resolved address list before a dial gives up.
pub const DIAL_PASSES: u32 = 3;
/// Pause after pass `n` is `n` times this step.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(500);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ConnectionManager {
    dns: DnsCache,
    source_ip: Option<IpAddr>,
    backoff_step: Duration,
    connect_timeout: Duration,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>, dns_ttl: Duration, source_ip: Option<IpAddr>) -> Self {
        Self {
            dns: DnsCache::new(resolver, dns_ttl),
            source_ip,
            backoff_step: DEFAULT_BACKOFF_STEP,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Manager backed by the operating system resolver.
    #[must_use]
    pub fn system(dns_ttl: Duration, source_ip: Option<IpAddr>) -> Self {
        Self::new(Arc::new(SystemResolver), dns_ttl, source_ip)
    }

    #[must_use]
    pub const fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Cached or freshly resolved addresses for `host`.
    ///
    /// # Errors
    ///
    /// Returns an error when resolution fails or yields no address.
    pub async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, ConnectionError> {
        self.dns.lookup(host).await
    }

    /// Connect to `host:port`, trying every resolved address in order for up
    /// to [`DIAL_PASSES`] passes.
    ///
    /// # Errors
    ///
    /// Returns an error when resolution fails, or
    /// [`ConnectionError::Exhausted`] with the last connect error once every
    /// pass failed.
    pub async fn dial_with_retry(&self, host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
        let addrs = self.lookup_host(host).await?;
        let mut last_err: Option<io::Error> = None;

        for pass in 1..=DIAL_PASSES {
            for ip in &addrs {
                let addr = SocketAddr::new(*ip, port);
                match self.connect_once(addr).await {
                    Ok(stream) => return Ok(stream),
                    Err(err) => {
                        debug!("Connect to {} failed on pass {}: {}", addr, pass, err);
                        last_err = Some(err);
                    }
                }
            }
            if pass < DIAL_PASSES {
                tokio::time::sleep(self.backoff_step.saturating_mul(pass)).await;
            }
        }

        let source = last_err.unwrap_or_else(|| io::Error::other("no address was attempted"));
        warn!(
            "Giving up on {}:{} after {} passes: {}",
            host, port, DIAL_PASSES, source
        );
        Err(ConnectionError::Exhausted {
            host: host.to_owned(),
            port,
            passes: DIAL_PASSES,
            source,
        })
    }

    async fn connect_once(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        if let Some(ip) = self.source_ip {
            socket.bind(SocketAddr::new(ip, 0))?;
        }
        socket.set_keepalive(true)?;
        let stream = tokio::time::timeout(self.connect_timeout, socket.connect(addr))
            .await
            .map_err(|_elapsed| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Check that `ip` can be used as a local source address on this host.
///
/// # Errors
///
/// Returns [`ConnectionError::Bind`] when binding an ephemeral port fails.
pub fn probe_source_ip(ip: IpAddr) -> Result<(), ConnectionError> {
    std::net::TcpListener::bind(SocketAddr::new(ip, 0))
        .map(drop)
        .map_err(|err| ConnectionError::Bind { ip, source: err })
}
