//! Watermarking a whole selection of files
//!
//! Files are processed one at a time in selection order. A failure on one
//! file is logged and recorded, then the next file is attempted.

use std::path::{Path, PathBuf};
use tracing::{error, info};
use crate::apply::{apply, OutputTarget};
use crate::error::{Error, Result};
use crate::pdf::{PdfLoader, Watermark};
use crate::select::select;

/// Everything one invocation of the tool asks for
#[derive(Debug, Clone)]
pub struct WatermarkRequest {
    pub watermark: Watermark,
    /// Explicit files; empty means every PDF in the working directory
    pub input_files: Vec<PathBuf>,
    /// File names to leave alone
    pub exclude: Vec<String>,
    pub output: OutputTarget,
}

/// A file that could not be watermarked
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// (input, written output) for every file that succeeded
    pub written: Vec<(PathBuf, PathBuf)>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Select the files for `request` relative to `cwd` and watermark each one
///
/// Returns [`Error::EmptySelection`] when there is nothing to do. Per-file
/// failures do not stop the run; they are collected in the report.
pub fn run<L: PdfLoader>(loader: &L, request: &WatermarkRequest, cwd: &Path) -> Result<BatchReport> {
    let files = select(&request.input_files, &request.exclude, cwd)?;
    info!(count = files.len(), "Watermarking with {:?}", request.watermark.text());

    let mut report = BatchReport::default();
    for path in files {
        info!("Processing file: {}", path.display());

        match apply(loader, &path, &request.watermark, &request.output) {
            Ok(written) => {
                if written != path {
                    info!("Wrote {}", written.display());
                }
                report.written.push((path, written));
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to watermark file");
                report.failures.push(FileFailure { path, error: e });
            }
        }
    }

    info!(
        succeeded = report.written.len(),
        failed = report.failures.len(),
        "All done!"
    );

    Ok(report)
}
