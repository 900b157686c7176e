use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::SourceError;

use super::{RequestSource, RoundRobin};

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Column(usize),
}

/// Renders a `${column}` template once per attempt, cycling through CSV rows.
pub struct TemplateSource {
    segments: Vec<Segment>,
    rows: RoundRobin<Vec<String>>,
}

impl TemplateSource {
    /// Load every row of `paths` and bind `template` against the header.
    ///
    /// The first file's header is authoritative; later files must repeat it.
    ///
    /// # Errors
    ///
    /// Returns an error when a path is not a `.csv` file, cannot be read,
    /// is empty, disagrees with the first header, or when the template
    /// names a column the header lacks, or when no data row exists.
    pub fn from_files(paths: &[PathBuf], template: &str) -> Result<Self, SourceError> {
        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        for path in paths {
            let (file_headers, file_rows) = read_csv(path)?;
            match headers.as_ref() {
                None => headers = Some(file_headers),
                Some(expected) => check_header(path, expected, &file_headers)?,
            }
            debug!("Loaded {} rows from {}", file_rows.len(), path.display());
            rows.extend(file_rows);
        }
        let headers = headers.unwrap_or_default();
        Self::from_rows(&headers, rows, template)
    }

    /// # Errors
    ///
    /// Returns an error when `rows` is empty or the template references a
    /// column missing from `headers`.
    pub fn from_rows(
        headers: &[String],
        rows: Vec<Vec<String>>,
        template: &str,
    ) -> Result<Self, SourceError> {
        if rows.is_empty() {
            return Err(SourceError::CsvNoRows);
        }
        let segments = compile(template, headers)?;
        Ok(Self {
            segments,
            rows: RoundRobin::new(rows),
        })
    }
}

impl RequestSource for TemplateSource {
    fn generate(&self) -> Result<Bytes, SourceError> {
        let row = self.rows.next().ok_or(SourceError::CsvNoRows)?;
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Column(index) => {
                    let value = row.get(*index).ok_or_else(|| SourceError::Generation {
                        reason: format!("row has no column {}", index),
                    })?;
                    output.push_str(value);
                }
            }
        }
        Ok(Bytes::from(output))
    }
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), SourceError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(SourceError::NotCsv {
            path: path.to_path_buf(),
        });
    }
    if !path.exists() {
        return Err(SourceError::FileMissing {
            path: path.to_path_buf(),
        });
    }

    let read_err = |err: csv::Error| SourceError::ReadCsv {
        path: path.to_path_buf(),
        source: err,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(read_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(read_err)?
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if idx == 0 {
                name.trim_start_matches(UTF8_BOM).to_owned()
            } else {
                name.to_owned()
            }
        })
        .collect();
    if headers.is_empty() {
        return Err(SourceError::CsvEmpty {
            path: path.to_path_buf(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        rows.push(record.iter().map(str::to_owned).collect());
    }
    Ok((headers, rows))
}

fn check_header(path: &Path, expected: &[String], found: &[String]) -> Result<(), SourceError> {
    if expected.len() != found.len() {
        return Err(SourceError::CsvColumnCount {
            path: path.to_path_buf(),
            expected: expected.len(),
            found: found.len(),
        });
    }
    for (index, (want, got)) in expected.iter().zip(found).enumerate() {
        if want != got {
            return Err(SourceError::CsvHeaderMismatch {
                path: path.to_path_buf(),
                index,
                expected: want.clone(),
                found: got.clone(),
            });
        }
    }
    Ok(())
}

/// Split the template into literal text and column references.
///
/// An unterminated `${` is kept as literal text.
fn compile(template: &str, headers: &[String]) -> Result<Vec<Segment>, SourceError> {
    let columns: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let mut segments = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        let (before, after_start) = rest.split_at(start);
        text.push_str(before);
        let after = after_start.get(2..).unwrap_or_default();
        let Some(end) = after.find('}') else {
            text.push_str(after_start);
            rest = "";
            break;
        };
        let (name, after_end) = after.split_at(end);
        match columns.get(name) {
            Some(index) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Column(*index));
            }
            None => {
                if !missing.iter().any(|known| known == name) {
                    missing.push(name.to_owned());
                }
            }
        }
        rest = after_end.get(1..).unwrap_or_default();
    }
    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }

    if missing.is_empty() {
        Ok(segments)
    } else {
        Err(SourceError::MissingColumns { missing })
    }
}
