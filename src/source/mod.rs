//! Request body producers.
//!
//! Every worker asks its [`RequestSource`] for the next payload before each
//! attempt. Sources are built once at setup and shared behind an `Arc`, so
//! `generate` takes `&self` and must be safe to call concurrently.
mod lines;
mod literal;
mod template;


use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use crate::error::SourceError;

pub use lines::LinesSource;
pub use literal::LiteralSource;
pub use template::TemplateSource;

pub trait RequestSource: Send + Sync {
    /// Produce the body for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns an error when no payload can be produced; the attempt is then
    /// recorded as a generation failure without touching the network.
    fn generate(&self) -> Result<Bytes, SourceError>;
}

/// How the request body is obtained for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySpec {
    Literal(String),
    Lines { files: String },
    Template { files: String, template: String },
}

impl BodySpec {
    /// Build the shared source described by this value.
    ///
    /// # Errors
    ///
    /// Returns an error when a backing file is missing, unreadable, or holds
    /// no usable data.
    pub fn build(&self) -> Result<Arc<dyn RequestSource>, SourceError> {
        let source: Arc<dyn RequestSource> = match self {
            Self::Literal(body) => Arc::new(LiteralSource::new(body.clone())),
            Self::Lines { files } => Arc::new(LinesSource::from_files(&split_paths(files))?),
            Self::Template { files, template } => {
                Arc::new(TemplateSource::from_files(&split_paths(files), template)?)
            }
        };
        Ok(source)
    }
}

/// Split a comma-separated path list, trimming blanks around each entry.
pub(crate) fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Lock-free round-robin cursor over a fixed list.
pub(crate) struct RoundRobin<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> RoundRobin<T> {
    pub(crate) const fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn next(&self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(idx.rem_euclid(self.items.len()))
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
