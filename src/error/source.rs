use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to generate request body: {reason}")]
    Generation { reason: String },
    #[error("Body file '{path}' does not exist.")]
    FileMissing { path: PathBuf },
    #[error("Failed to read body file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Body files contained no lines.")]
    NoLines,
    #[error("Template file '{path}' must have a .csv extension.")]
    NotCsv { path: PathBuf },
    #[error("Failed to read CSV file '{path}': {source}")]
    ReadCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("CSV file '{path}' is empty.")]
    CsvEmpty { path: PathBuf },
    #[error("CSV file '{path}' has {found} columns, expected {expected}.")]
    CsvColumnCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("CSV file '{path}' has header '{found}' at position {index}, expected '{expected}'.")]
    CsvHeaderMismatch {
        path: PathBuf,
        index: usize,
        expected: String,
        found: String,
    },
    #[error("CSV files have no data rows.")]
    CsvNoRows,
    #[error("Template variables not found in CSV headers: {missing:?}")]
    MissingColumns { missing: Vec<String> },
}
