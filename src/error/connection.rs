use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No addresses resolved for '{host}'.")]
    NoAddresses { host: String },
    #[error("Failed to bind source address {ip}: {source}")]
    Bind {
        ip: IpAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Connect to {host}:{port} failed after {passes} passes, last error: {source}")]
    Exhausted {
        host: String,
        port: u16,
        passes: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("Connect target '{uri}' has no host.")]
    MissingHost { uri: String },
}
