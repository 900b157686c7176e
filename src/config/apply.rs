use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, SurgeArgs, parse_header};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, DurationValue};

/// Applies configuration values to CLI arguments that were not given on the
/// command line.
///
/// # Errors
///
/// Returns an error when a config value is invalid.
pub fn apply_config(
    args: &mut SurgeArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = url;
    }

    if !is_cli(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_cli(matches, "concurrency")
        && let Some(value) = config.concurrency
    {
        args.concurrency = Some(ensure_positive_u64(value, "concurrency")?);
    }

    if !is_cli(matches, "qps")
        && let Some(value) = config.qps
    {
        args.qps = Some(ensure_positive_u64(value, "qps")?);
    }

    if !is_cli(matches, "max_workers")
        && let Some(value) = config.max_workers
    {
        args.max_workers = Some(ensure_positive_u64(value, "max_workers")?);
    }

    if !is_cli(matches, "duration")
        && let Some(value) = config.duration.as_ref()
    {
        args.duration = value
            .to_duration()
            .map_err(|err| invalid_duration("duration", err))?;
    }

    if !is_cli(matches, "request_timeout")
        && let Some(value) = config.timeout.as_ref()
    {
        args.request_timeout = positive_duration(value, "timeout")?;
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        let mut parsed = Vec::with_capacity(headers.len());
        for header in headers {
            parsed.push(
                parse_header(header)
                    .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
            );
        }
        args.headers = parsed;
    }

    if !is_cli(matches, "request")
        && let Some(request) = config.request.clone()
    {
        args.request = Some(request);
    }

    if !is_cli(matches, "file")
        && let Some(file) = config.file.clone()
    {
        args.file = Some(file);
    }

    if !is_cli(matches, "req_template")
        && let Some(template) = config.req_template.clone()
    {
        args.req_template = Some(template);
    }

    if !is_cli(matches, "src_ip")
        && let Some(src_ip) = config.src_ip.clone()
    {
        args.src_ip = Some(src_ip);
    }

    if !is_cli(matches, "http2")
        && let Some(http2) = config.http2
    {
        args.http2 = http2;
    }

    if !is_cli(matches, "interval_stats")
        && let Some(enabled) = config.interval_stats
    {
        args.interval_stats = enabled;
    }

    if !is_cli(matches, "interval_output")
        && let Some(output) = config.interval_output
    {
        args.interval_output = output;
    }

    if !is_cli(matches, "stats_file")
        && let Some(path) = config.stats_file.clone()
    {
        args.stats_file = path;
    }

    if !is_cli(matches, "stats_interval")
        && let Some(value) = config.stats_interval.as_ref()
    {
        args.stats_interval = positive_duration(value, "stats_interval")?;
    }

    if !is_cli(matches, "dns_ttl")
        && let Some(value) = config.dns_ttl.as_ref()
    {
        args.dns_ttl = positive_duration(value, "dns_ttl")?;
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &'static str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value)
        .map_err(|err| AppError::config(ConfigError::FieldMustBePositive { field, source: err }))
}

fn positive_duration(
    value: &DurationValue,
    field: &'static str,
) -> AppResult<std::time::Duration> {
    value
        .to_positive_duration()
        .map_err(|err| invalid_duration(field, err))
}

fn invalid_duration(field: &'static str, err: crate::error::ValidationError) -> AppError {
    AppError::config(ConfigError::InvalidDuration { field, source: err })
}
