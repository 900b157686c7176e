use std::net::IpAddr;

use thiserror::Error;

use super::ConnectionError;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid header format: '{value}'. Expected 'Key: Value'")]
    InvalidHeaderFormat { value: String },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid HTTP method '{value}'.")]
    InvalidMethod { value: String },
    #[error("--concurrency and --qps cannot be used together.")]
    ConcurrencyQpsConflict,
    #[error("One of --concurrency or --qps is required.")]
    MissingLoadMode,
    #[error("--max-workers only applies with --qps.")]
    MaxWorkersWithoutQps,
    #[error("--request cannot be combined with --file or --req-template.")]
    RequestWithFile,
    #[error("--req-template requires --file.")]
    TemplateRequiresFile,
    #[error("Invalid source IP '{value}': {source}")]
    InvalidSourceIp {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("Source IP {ip} is not usable: {source}")]
    SourceIpUnavailable {
        ip: IpAddr,
        #[source]
        source: ConnectionError,
    },
    #[error("Missing URL (set --url or provide in config).")]
    MissingUrl,
}
