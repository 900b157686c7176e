//! HTTP request execution: connection management, the pooled transport and
//! the dispatcher that drives traffic through it.
pub mod connection;
pub mod dispatcher;
pub mod target;
pub mod transport;

#[cfg(test)]
mod tests;

pub use connection::{ConnectionManager, DnsCache, ManagedConnector, Resolver, SystemResolver};
pub use dispatcher::{Dispatcher, RequestExecutor, RunConfig, RunMode};
pub use target::Target;
pub use transport::HttpTransport;
