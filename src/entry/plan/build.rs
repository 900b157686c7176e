use std::net::IpAddr;
use std::path::PathBuf;

use clap::ArgMatches;
use tracing::info;

use crate::app::{IntervalPlan, LocalRun};
use crate::args::{PositiveU64, SurgeArgs, parse_header_list, parse_source_ip};
use crate::error::{AppError, AppResult, ValidationError};
use crate::http::connection::probe_source_ip;
use crate::http::{RunConfig, RunMode};
use crate::source::BodySpec;

pub(crate) fn build_plan(mut args: SurgeArgs, matches: &ArgMatches) -> AppResult<LocalRun> {
    if let Some(config) = crate::config::load_config(args.config.as_deref())? {
        crate::config::apply_config(&mut args, matches, &config)?;
    }

    if args.url.trim().is_empty() {
        tracing::error!("Missing URL (set --url or provide in config).");
        return Err(AppError::validation(ValidationError::MissingUrl));
    }

    let mode = resolve_mode(&args)?;
    let body = resolve_body(&args)?;
    let headers = resolve_headers(&args)?;
    let source_ip = match args.src_ip.as_deref() {
        Some(value) => Some(resolve_source_ip(value)?),
        None => None,
    };
    let interval = args.interval_stats.then(|| IntervalPlan {
        output: args.interval_output,
        stats_file: PathBuf::from(&args.stats_file),
        period: args.stats_interval,
    });

    Ok(LocalRun {
        url: args.url,
        method: args.method.as_method(),
        headers,
        body,
        run: RunConfig {
            mode,
            duration: args.duration,
            request_timeout: args.request_timeout,
        },
        source_ip,
        http2: args.http2,
        dns_ttl: args.dns_ttl,
        interval,
    })
}

fn resolve_mode(args: &SurgeArgs) -> AppResult<RunMode> {
    match (args.concurrency, args.qps) {
        (Some(_), Some(_)) => Err(AppError::validation(
            ValidationError::ConcurrencyQpsConflict,
        )),
        (None, None) => Err(AppError::validation(ValidationError::MissingLoadMode)),
        (Some(workers), None) => {
            if args.max_workers.is_some() {
                return Err(AppError::validation(ValidationError::MaxWorkersWithoutQps));
            }
            Ok(RunMode::Concurrency {
                workers: workers.get(),
            })
        }
        (None, Some(qps)) => Ok(RunMode::rate(
            qps.get(),
            args.max_workers.map(PositiveU64::get),
        )),
    }
}

fn resolve_body(args: &SurgeArgs) -> AppResult<BodySpec> {
    match (
        args.request.as_ref(),
        args.file.as_ref(),
        args.req_template.as_ref(),
    ) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            Err(AppError::validation(ValidationError::RequestWithFile))
        }
        (None, None, Some(_)) => Err(AppError::validation(
            ValidationError::TemplateRequiresFile,
        )),
        (Some(request), None, None) => Ok(BodySpec::Literal(request.clone())),
        (None, Some(files), Some(template)) => Ok(BodySpec::Template {
            files: files.clone(),
            template: template.clone(),
        }),
        (None, Some(files), None) => Ok(BodySpec::Lines {
            files: files.clone(),
        }),
        (None, None, None) => Ok(BodySpec::Literal(String::new())),
    }
}

/// `-H` headers first, then the `--headers` list, in command-line order.
fn resolve_headers(args: &SurgeArgs) -> AppResult<Vec<(String, String)>> {
    let mut headers = args.headers.clone();
    if let Some(list) = args.header_list.as_deref() {
        headers.extend(parse_header_list(list)?);
    }
    Ok(headers)
}

fn resolve_source_ip(value: &str) -> AppResult<IpAddr> {
    let ip = parse_source_ip(value)?;
    probe_source_ip(ip).map_err(|err| {
        AppError::validation(ValidationError::SourceIpUnavailable { ip, source: err })
    })?;
    info!("Binding outgoing connections to {}", ip);
    Ok(ip)
}
