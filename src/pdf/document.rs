//! The PDF capability the watermark applier relies on
//!
//! [`PdfLoader`] opens a document and [`PdfDocument`] exposes the few
//! operations needed to stamp it: count pages, overlay text on one page and
//! serialize the result. Closing is dropping. [`LopdfLoader`] is the real
//! implementation; tests substitute in-memory fakes.

use std::io::Write;
use std::path::Path;
use lopdf::{Document, ObjectId};
use tracing::debug;
use crate::error::{Error, Result};
use super::stamp::{stamp_page, SharedResources, Watermark};

/// Opens documents for watermarking
pub trait PdfLoader {
    type Document: PdfDocument;

    /// Open the document at `path`
    ///
    /// Fails with [`Error::Open`] when the file is missing, unreadable, not a
    /// PDF, or encrypted.
    fn open(&self, path: &Path) -> Result<Self::Document>;
}

/// An open document being watermarked
pub trait PdfDocument {
    fn page_count(&self) -> usize;

    /// Draw the watermark on top of page `page_index` (zero-based)
    fn overlay_text(&mut self, page_index: usize, watermark: &Watermark) -> Result<()>;

    /// Serialize the whole document
    fn write_to(&mut self, out: &mut dyn Write) -> std::io::Result<()>;
}

/// [`PdfLoader`] backed by lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfLoader;

impl PdfLoader for LopdfLoader {
    type Document = LopdfDocument;

    fn open(&self, path: &Path) -> Result<LopdfDocument> {
        let doc = Document::load(path).map_err(|e| Error::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        ensure_not_encrypted(path, &doc)?;
        Ok(LopdfDocument::new(doc))
    }
}

/// Encrypted documents are refused rather than rewritten without their protection
fn ensure_not_encrypted(path: &Path, doc: &Document) -> Result<()> {
    if doc.is_encrypted() {
        return Err(Error::Open {
            path: path.to_path_buf(),
            reason: "document is encrypted".to_string(),
        });
    }
    Ok(())
}

/// A lopdf document with its pages in page-number order
pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    shared: Option<SharedResources>,
}

impl LopdfDocument {
    pub fn new(doc: Document) -> Self {
        // get_pages is keyed by page number, so values come out in page order
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!(pages = pages.len(), "document opened");

        Self { doc, pages, shared: None }
    }

    /// The underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.doc
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn overlay_text(&mut self, page_index: usize, watermark: &Watermark) -> Result<()> {
        let page_id = *self.pages.get(page_index).ok_or_else(|| {
            Error::General(format!(
                "page index {} out of range ({} pages)",
                page_index,
                self.pages.len()
            ))
        })?;

        // Font and graphics state are created on first use and shared by all pages
        let shared = match self.shared {
            Some(shared) => shared,
            None => {
                let shared = SharedResources::create(&mut self.doc, watermark.style());
                self.shared = Some(shared);
                shared
            }
        };

        stamp_page(&mut self.doc, page_id, watermark, shared)
    }

    fn write_to(&mut self, mut out: &mut dyn Write) -> std::io::Result<()> {
        self.doc.compress();
        self.doc.save_to(&mut out).map_err(std::io::Error::other)
    }
}
