use crate::app::{LocalRun, run_local};
use crate::error::AppResult;

pub(crate) async fn execute_plan(plan: LocalRun) -> AppResult<()> {
    let summary = run_local(plan).await?;
    tracing::debug!(
        "Run finished after {:?} with {} successes",
        summary.duration,
        summary.totals.total_requests
    );
    Ok(())
}
