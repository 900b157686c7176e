mod app;
mod config;
mod connection;
mod http;
mod metrics;
mod source;
mod validation;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use connection::ConnectionError;
pub use http::HttpError;
pub use metrics::MetricsError;
pub use source::SourceError;
pub use validation::ValidationError;
