mod plan;

use std::ffi::OsString;
use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::SurgeArgs;
use crate::config::loader::DEFAULT_CONFIG_FILES;
use crate::error::AppResult;
use plan::{build_plan, execute_plan};

pub(crate) fn run() -> AppResult<()> {
    let raw_args: Vec<OsString> = std::env::args_os().collect();
    if is_bare_invocation(&raw_args) && !has_default_config(Path::new(".")) {
        SurgeArgs::command().print_help()?;
        println!();
        return Ok(());
    }

    let matches = SurgeArgs::command().get_matches_from(raw_args);
    let args = SurgeArgs::from_arg_matches(&matches)?;

    crate::system::logger::init_logging(args.verbose, args.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(args, &matches))
}

/// No arguments at all, or only a `--` separator.
fn is_bare_invocation(raw_args: &[OsString]) -> bool {
    matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--")
}

/// A bare invocation still runs when `dir` holds one of the default config
/// files; otherwise it prints help.
fn has_default_config(dir: &Path) -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|name| dir.join(name).exists())
}

async fn run_async(args: SurgeArgs, matches: &ArgMatches) -> AppResult<()> {
    let plan = build_plan(args, matches)?;
    execute_plan(plan).await
}
