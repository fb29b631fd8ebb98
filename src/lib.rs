//! PDF Watermark Library
//!
//! Stamps a short text diagonally across every page of PDF files.
//! This library provides functionality to:
//! - Select files from an explicit list or a directory scan, minus exclusions
//! - Overlay watermark text on every page through a narrow PDF interface
//! - Write results atomically so failures never corrupt the original
//!
//! # Example
//!
//! ```no_run
//! use pdf_watermark::apply::OutputTarget;
//! use pdf_watermark::batch::{run, WatermarkRequest};
//! use pdf_watermark::pdf::{LopdfLoader, Watermark};
//! use std::path::{Path, PathBuf};
//!
//! let request = WatermarkRequest {
//!     watermark: Watermark::new("CONFIDENTIAL").expect("valid text"),
//!     input_files: vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
//!     exclude: vec!["b.pdf".to_string()],
//!     output: OutputTarget::InPlace,
//! };
//!
//! let report = run(&LopdfLoader, &request, Path::new(".")).expect("nothing to do");
//! assert!(report.is_success());
//! ```

pub mod error;
pub mod pdf;
pub mod layout;
pub mod select;
pub mod apply;
pub mod batch;

// Re-export commonly used items
pub use error::{Error, Result};
