mod build;
mod execute;

pub(super) use build::build_plan;
pub(super) use execute::execute_plan;
