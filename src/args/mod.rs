//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;


pub use cli::SurgeArgs;
pub use types::{HttpMethod, IntervalOutput, PositiveU64};

pub(crate) use parsers::{
    parse_duration_value, parse_header, parse_header_list, parse_source_ip,
};
