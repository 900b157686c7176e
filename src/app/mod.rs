mod runner;
pub(crate) mod summary;

pub(crate) use runner::{IntervalPlan, LocalRun, run_local};
