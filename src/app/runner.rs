use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use crate::args::IntervalOutput;
use crate::error::AppResult;
use crate::http::{ConnectionManager, Dispatcher, HttpTransport, RequestExecutor, RunConfig, Target};
use crate::metrics::{
    CsvIntervalSink, IntervalReporter, IntervalSink, LogIntervalSink, RunSummary, StatsAggregator,
};
use crate::shutdown::StopSignal;
use crate::source::BodySpec;
use crate::system::shutdown_handlers::setup_signal_shutdown_handler;

use super::summary;

/// Where and how often interval snapshots are written.
#[derive(Debug, Clone)]
pub(crate) struct IntervalPlan {
    pub(crate) output: IntervalOutput,
    pub(crate) stats_file: PathBuf,
    pub(crate) period: Duration,
}

/// Fully validated settings for one local run.
#[derive(Debug, Clone)]
pub(crate) struct LocalRun {
    pub(crate) url: String,
    pub(crate) method: http::Method,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: BodySpec,
    pub(crate) run: RunConfig,
    pub(crate) source_ip: Option<IpAddr>,
    pub(crate) http2: bool,
    pub(crate) dns_ttl: Duration,
    pub(crate) interval: Option<IntervalPlan>,
}

/// Build every run-scoped component, drive the dispatcher to completion and
/// print the summary.
///
/// Everything that can fail fatally (target, body source, stats file) is
/// prepared before the first worker starts.
pub(crate) async fn run_local(plan: LocalRun) -> AppResult<RunSummary> {
    let target = Target::parse(&plan.url, plan.method.clone(), &plan.headers)?;
    target.build_request(Bytes::new())?;
    let target = Arc::new(target);

    let source = plan.body.build()?;
    let stats = Arc::new(StatsAggregator::new(plan.interval.is_some()));
    let manager = Arc::new(ConnectionManager::system(plan.dns_ttl, plan.source_ip));
    let transport = HttpTransport::new(manager, plan.run.request_timeout, plan.http2);

    let reporter = match plan.interval.as_ref() {
        Some(interval) => Some(build_reporter(interval, &stats).await?),
        None => None,
    };

    let stop = StopSignal::new();
    let signal_task = setup_signal_shutdown_handler(&stop);
    let reporter_task = reporter.map(|reporter| tokio::spawn(reporter.run(stop.clone())));

    info!(
        "Target {} {}:{} ({:?}, timeout {:?})",
        target.method(),
        target.host(),
        target.port(),
        plan.run.mode,
        plan.run.request_timeout
    );
    let executor = RequestExecutor::new(source, target, transport, stats.clone());
    let elapsed = Dispatcher::new(plan.run, executor, stop.clone())
        .start()
        .await?;
    stop.fire();

    if let Some(task) = reporter_task {
        let rows = task.await?.finish().await?;
        info!("Wrote {} interval rows", rows);
    }
    signal_task.await?;

    let run_summary = stats.finalize(elapsed);
    summary::print_summary(&run_summary);
    Ok(run_summary)
}

async fn build_reporter(
    interval: &IntervalPlan,
    stats: &Arc<StatsAggregator>,
) -> AppResult<IntervalReporter> {
    let sink: Box<dyn IntervalSink> = match interval.output {
        IntervalOutput::Csv => {
            let sink = CsvIntervalSink::create(&interval.stats_file).await?;
            info!("Writing interval stats to {}", sink.path().display());
            Box::new(sink)
        }
        IntervalOutput::Log => Box::new(LogIntervalSink),
    };
    Ok(IntervalReporter::new(stats.clone(), sink, interval.period))
}
