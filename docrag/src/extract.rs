//! Turning uploaded files into plain text.
//!
//! The format is decided by the file name's extension: `.pdf` goes through
//! [`lopdf`] page by page, `.txt` is read as UTF-8. Anything else is rejected
//! with [`RagError::UnsupportedFormat`].

use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// A file format the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 plain text.
    Text,
}

impl DocumentFormat {
    /// Determine the format from a file name's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] for any extension other than
    /// `pdf` or `txt`, including a missing one.
    pub fn from_filename(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Text),
            _ => Err(RagError::UnsupportedFormat { extension }),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => f.write_str("PDF"),
            Self::Text => f.write_str("TXT"),
        }
    }
}

/// Turns raw file bytes into a single text string.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of `bytes`, interpreted as `format`.
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String>;
}

/// The default [`TextExtractor`] for PDF and plain text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextExtractor;

impl TextExtractor for FileTextExtractor {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Pdf => extract_pdf(bytes),
            DocumentFormat::Text => {
                String::from_utf8(bytes.to_vec()).map_err(|e| RagError::Extraction {
                    format: format.to_string(),
                    message: format!("file is not valid UTF-8: {e}"),
                })
            }
        }
    }
}

/// Extract every page's text, joined by newlines.
///
/// Pages that yield no text (image-only scans) or fail to decode are skipped.
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| RagError::Extraction {
        format: DocumentFormat::Pdf.to_string(),
        message: e.to_string(),
    })?;

    let pages = document.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => texts.push(text),
            Ok(_) => debug!(page = page_number, "skipping page without text"),
            Err(e) => warn!(page = page_number, error = %e, "skipping unreadable page"),
        }
    }

    debug!(page_count = pages.len(), text_pages = texts.len(), "extracted PDF text");
    Ok(texts.join("\n"))
}
