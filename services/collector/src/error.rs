//! Transport errors
//!
//! None of these abort a run: the loader turns each into an unavailable
//! snapshot for the affected source.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("source returned no data")]
    Empty,
}

impl From<calamine::Error> for SourceError {
    fn from(err: calamine::Error) -> Self {
        SourceError::Workbook(err.to_string())
    }
}
