use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ConnectionError;

pub const DEFAULT_DNS_TTL: Duration = Duration::from_secs(300);

/// Hostname resolution backend used by [`DnsCache`].
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host` to its addresses, in the order they should be tried.
    ///
    /// # Errors
    ///
    /// Returns the resolver's I/O error when the lookup fails.
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in tokio::net::lookup_host((host, 0)).await? {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

struct CacheEntry {
    addrs: Vec<IpAddr>,
    expires_at: Instant,
}

/// Hostname to address cache with a fixed TTL.
///
/// Entries expire lazily: an entry read after its deadline is discarded and
/// the host resolved again. The lock only guards map access; resolution runs
/// without it, so two concurrent misses may both resolve and the later write
/// wins.
pub struct DnsCache {
    resolver: Arc<dyn Resolver>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DnsCache {
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// # Errors
    ///
    /// Returns an error when resolution fails or yields no address.
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ConnectionError> {
        if let Some(ip) = parse_ip_literal(host) {
            return Ok(vec![ip]);
        }
        if let Some(addrs) = self.cached(host) {
            return Ok(addrs);
        }

        let addrs = self
            .resolver
            .resolve(host)
            .await
            .map_err(|err| ConnectionError::Resolve {
                host: host.to_owned(),
                source: err,
            })?;
        if addrs.is_empty() {
            return Err(ConnectionError::NoAddresses {
                host: host.to_owned(),
            });
        }
        debug!("Resolved {} to {:?}", host, addrs);

        let expires_at = Instant::now()
            .checked_add(self.ttl)
            .unwrap_or_else(Instant::now);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                host.to_owned(),
                CacheEntry {
                    addrs: addrs.clone(),
                    expires_at,
                },
            );
        Ok(addrs)
    }

    fn cached(&self, host: &str) -> Option<Vec<IpAddr>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(host) {
                None => return None,
                Some(entry) if now < entry.expires_at => return Some(entry.addrs.clone()),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(host)
            .is_some_and(|entry| now >= entry.expires_at)
        {
            entries.remove(host);
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `http::Uri::host` keeps the brackets around IPv6 literals.
fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host);
    trimmed.parse().ok()
}
