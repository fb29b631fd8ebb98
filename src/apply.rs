//! Watermarking a single file
//!
//! Per file the flow is open → stamp pages 0..N-1 in order → save. Any failure
//! stops that file and nothing is written: output goes to a temporary file in
//! the destination directory and is renamed into place only once the whole
//! document has been serialized, so a failed run never leaves a truncated or
//! half-stamped PDF behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{Error, Result};
use crate::pdf::{PdfDocument, PdfLoader, Watermark};

/// Where the watermarked document is written
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Replace the original file
    #[default]
    InPlace,
    /// Write `<stem><suffix>.pdf` beside the original, never clobbering an
    /// existing file
    Suffixed(String),
}

impl OutputTarget {
    /// The path the watermarked version of `input` should be written to
    pub fn resolve(&self, input: &Path) -> PathBuf {
        match self {
            OutputTarget::InPlace => input.to_path_buf(),
            OutputTarget::Suffixed(suffix) => {
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let stem = format!("{}{}", stem, suffix);
                ensure_new_file(input.with_file_name(format!("{}.pdf", stem)), &stem)
            }
        }
    }
}

/// Append `_1`, `_2`, … to the stem until the path does not exist
fn ensure_new_file(mut path: PathBuf, stem: &str) -> PathBuf {
    let mut index = 1;
    while path.exists() {
        path = path.with_file_name(format!("{}_{}.pdf", stem, index));
        index += 1;
    }
    path
}

/// Watermark every page of the PDF at `path` and write it out
///
/// Returns the path that was written. Open failures are [`Error::Open`], a
/// page that cannot be stamped is [`Error::Page`] with its zero-based index,
/// and a failed save is [`Error::Write`].
///
/// # Example
///
/// ```no_run
/// use pdf_watermark::apply::{apply, OutputTarget};
/// use pdf_watermark::pdf::{LopdfLoader, Watermark};
/// use std::path::Path;
///
/// let watermark = Watermark::new("CONFIDENTIAL").expect("valid text");
/// apply(&LopdfLoader, Path::new("report.pdf"), &watermark, &OutputTarget::InPlace)
///     .expect("Failed to watermark");
/// ```
pub fn apply<L: PdfLoader>(
    loader: &L,
    path: &Path,
    watermark: &Watermark,
    output: &OutputTarget,
) -> Result<PathBuf> {
    let mut doc = loader.open(path)?;
    let page_count = doc.page_count();
    debug!(path = %path.display(), page_count, "opened");

    for index in 0..page_count {
        doc.overlay_text(index, watermark).map_err(|e| Error::Page {
            path: path.to_path_buf(),
            index,
            reason: e.to_string(),
        })?;
    }
    debug!(path = %path.display(), "all pages watermarked");

    let target = output.resolve(path);
    persist_atomically(&mut doc, &target)?;
    debug!(target = %target.display(), "saved");

    Ok(target)
}

/// Serialize `doc` to a sibling temp file, then rename it over `target`
///
/// A symlinked target is followed so the link keeps pointing at the updated
/// file, and an existing target's permissions carry over to the new file.
fn persist_atomically<D: PdfDocument>(doc: &mut D, target: &Path) -> Result<()> {
    let write_error = |source: std::io::Error| Error::Write {
        path: target.to_path_buf(),
        source,
    };

    let existing = fs::canonicalize(target).ok();
    let target = existing.as_deref().unwrap_or(target);

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropping the temp file on any early return deletes it
    let mut temp = tempfile::Builder::new()
        .prefix(".pdf-watermark-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        doc.write_to(&mut writer).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
    }
    if existing.is_some() {
        let permissions = fs::metadata(target).map_err(write_error)?.permissions();
        temp.as_file().set_permissions(permissions).map_err(write_error)?;
    }
    temp.as_file().sync_all().map_err(write_error)?;

    temp.persist(target).map_err(|e| write_error(e.error))?;
    Ok(())
}
