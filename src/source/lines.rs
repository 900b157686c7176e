use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::SourceError;

use super::{RequestSource, RoundRobin};

/// Cycles through every line of one or more files, in file order.
pub struct LinesSource {
    lines: RoundRobin<Bytes>,
}

impl LinesSource {
    /// Read all lines of `paths` up front.
    ///
    /// # Errors
    ///
    /// Returns an error when a file is missing or unreadable, or when the
    /// files hold no lines at all.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self, SourceError> {
        let mut lines = Vec::new();
        for path in paths {
            let content = read_body_file(path)?;
            let before = lines.len();
            lines.extend(content.lines().map(|line| Bytes::from(line.to_owned())));
            debug!(
                "Loaded {} lines from {}",
                lines.len().saturating_sub(before),
                path.display()
            );
        }
        Self::from_lines(lines)
    }

    /// # Errors
    ///
    /// Returns [`SourceError::NoLines`] for an empty list.
    pub fn from_lines(lines: Vec<Bytes>) -> Result<Self, SourceError> {
        if lines.is_empty() {
            return Err(SourceError::NoLines);
        }
        Ok(Self {
            lines: RoundRobin::new(lines),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.len() == 0
    }
}

impl RequestSource for LinesSource {
    fn generate(&self) -> Result<Bytes, SourceError> {
        self.lines.next().cloned().ok_or(SourceError::NoLines)
    }
}

fn read_body_file(path: &Path) -> Result<String, SourceError> {
    if !path.exists() {
        return Err(SourceError::FileMissing {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|err| SourceError::ReadFile {
        path: path.to_path_buf(),
        source: err,
    })
}
