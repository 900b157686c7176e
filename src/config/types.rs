use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, IntervalOutput, parse_duration_value};
use crate::error::ValidationError;

/// Settings accepted from `surge.toml` / `surge.json`. Every field is
/// optional; values given on the command line take precedence.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub concurrency: Option<u64>,
    pub qps: Option<u64>,
    pub max_workers: Option<u64>,
    pub duration: Option<DurationValue>,
    pub timeout: Option<DurationValue>,
    pub headers: Option<Vec<String>>,
    pub request: Option<String>,
    pub file: Option<String>,
    pub req_template: Option<String>,
    pub src_ip: Option<String>,
    pub http2: Option<bool>,
    pub interval_stats: Option<bool>,
    pub interval_output: Option<IntervalOutput>,
    pub stats_file: Option<String>,
    pub stats_interval: Option<DurationValue>,
    pub dns_ttl: Option<DurationValue>,
}

/// Either whole seconds (`30`) or a suffixed string (`"250ms"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration_value(text),
        }
    }

    pub(crate) fn to_positive_duration(&self) -> Result<Duration, ValidationError> {
        let duration = self.to_duration()?;
        if duration.is_zero() {
            return Err(ValidationError::DurationZero);
        }
        Ok(duration)
    }
}
