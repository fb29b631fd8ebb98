//! Error types for the PDF watermark library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF watermark library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be opened (missing, unreadable, corrupt or encrypted)
    #[error("Cannot open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    /// A page could not be stamped; `index` is zero-based
    #[error("Cannot watermark page {} of {}: {reason}", .index + 1, .path.display())]
    Page {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    /// The output could not be persisted
    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Nothing left to process after discovery and exclusions
    #[error("No PDF files left to process")]
    EmptySelection,

    /// Watermark text rejected
    #[error("Invalid watermark text: {0}")]
    InvalidText(String),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Path of the file this error is about, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Open { path, .. } | Error::Page { path, .. } | Error::Write { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_error_is_one_based_for_humans() {
        let err = Error::Page {
            path: PathBuf::from("report.pdf"),
            index: 2,
            reason: "bad Contents".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot watermark page 3 of report.pdf: bad Contents"
        );
        assert_eq!(err.path(), Some(std::path::Path::new("report.pdf")));
    }

    #[test]
    fn test_empty_selection_has_no_path() {
        assert!(Error::EmptySelection.path().is_none());
    }
}
