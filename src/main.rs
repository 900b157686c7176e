mod app;
mod args;
mod config;
mod entry;
mod error;
mod http;
mod metrics;
mod shutdown;
mod source;
mod system;

use error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
