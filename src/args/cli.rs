use clap::Parser;
use std::time::Duration;

use super::defaults::{
    DEFAULT_DNS_TTL, DEFAULT_DURATION, DEFAULT_STATS_FILE, DEFAULT_TIMEOUT, DEFAULT_URL,
};
use super::parsers::{parse_duration_arg, parse_header, parse_positive_u64, parse_run_duration};
use super::types::{HttpMethod, IntervalOutput, PositiveU64};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "HTTP load generator: fixed-concurrency or fixed-rate traffic with DNS-cached retrying dials and per-interval latency percentiles."
)]
pub struct SurgeArgs {
    /// Target URL (http only)
    #[arg(long = "url", short = 'u', default_value = DEFAULT_URL)]
    pub url: String,

    /// Number of persistent workers (exclusive with --qps)
    #[arg(long = "concurrency", short = 'c', value_parser = parse_positive_u64)]
    pub concurrency: Option<PositiveU64>,

    /// Target requests per second (exclusive with --concurrency)
    #[arg(long = "qps", short = 'q', value_parser = parse_positive_u64)]
    pub qps: Option<PositiveU64>,

    /// Run duration (supports ms/s/m/h; 0 stops immediately)
    #[arg(
        long = "duration",
        short = 'd',
        default_value = DEFAULT_DURATION,
        value_parser = parse_run_duration
    )]
    pub duration: Duration,

    /// Per-request timeout, including the response body (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = DEFAULT_TIMEOUT, value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Worker pool size in rate mode [default: max(1000, qps / 5)]
    #[arg(long = "max-workers", value_parser = parse_positive_u64)]
    pub max_workers: Option<PositiveU64>,

    /// HTTP method
    #[arg(
        long = "method",
        short = 'X',
        value_enum,
        ignore_case = true,
        default_value_t = HttpMethod::Post
    )]
    pub method: HttpMethod,

    /// Extra header 'Key: Value' (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Extra headers as a list, 'k1:v1,k2:v2'
    #[arg(long = "headers")]
    pub header_list: Option<String>,

    /// Literal request body (exclusive with --file and --req-template)
    #[arg(long = "request")]
    pub request: Option<String>,

    /// Comma-separated body files; each line is one request body
    #[arg(long = "file")]
    pub file: Option<String>,

    /// Body template with ${column} placeholders filled from the CSV rows of --file
    #[arg(long = "req-template")]
    pub req_template: Option<String>,

    /// Local source IP to bind outgoing connections to
    #[arg(long = "src-ip")]
    pub src_ip: Option<String>,

    /// Speak HTTP/2 with prior knowledge instead of HTTP/1.1
    #[arg(long = "http2")]
    pub http2: bool,

    /// Report request count, errors and latency percentiles every interval
    #[arg(long = "interval-stats", alias = "enable-second-stats")]
    pub interval_stats: bool,

    /// Destination for interval stats
    #[arg(long = "interval-output", value_enum, default_value_t = IntervalOutput::Csv)]
    pub interval_output: IntervalOutput,

    /// CSV file for interval stats
    #[arg(long = "stats-file", default_value = DEFAULT_STATS_FILE)]
    pub stats_file: String,

    /// Interval length for interval stats (supports ms/s/m/h)
    #[arg(long = "stats-interval", default_value = "1s", value_parser = parse_duration_arg)]
    pub stats_interval: Duration,

    /// How long resolved addresses are reused (supports ms/s/m/h)
    #[arg(long = "dns-ttl", default_value = DEFAULT_DNS_TTL, value_parser = parse_duration_arg)]
    pub dns_ttl: Duration,

    /// Path to config file (TOML or JSON). Defaults to surge.toml or surge.json if present.
    #[arg(long = "config")]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}
