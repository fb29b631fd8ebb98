//! PDF manipulation module

pub mod document;
pub mod stamp;

// Re-export commonly used items
pub use document::{LopdfDocument, LopdfLoader, PdfDocument, PdfLoader};
pub use stamp::{Watermark, WatermarkStyle, MAX_TEXT_LENGTH};
