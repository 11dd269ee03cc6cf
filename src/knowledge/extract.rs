//! Document text extraction

use async_trait::async_trait;
use thiserror::Error;

/// Maximum accepted document size (10 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Failure extracting text from a document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// Document is not in a format the extractor understands
    #[error("invalid document format: {0}")]
    InvalidFormat(String),

    /// Document exceeds the size limit
    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Turns a binary document into plain text
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract the text of `bytes`, named `name`
    ///
    /// # Errors
    ///
    /// Returns error if the document is too large or cannot be parsed
    async fn extract(&self, bytes: &[u8], name: &str) -> Result<String, ExtractError>;
}

/// Extractor for UTF-8 text documents (plain text, markdown, csv)
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    max_bytes: usize,
}

impl PlainTextExtractor {
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENT_BYTES)
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8], name: &str) -> Result<String, ExtractError> {
        if bytes.len() > self.max_bytes {
            return Err(ExtractError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        if bytes.starts_with(b"%PDF") {
            return Err(ExtractError::InvalidFormat(format!(
                "{name}: PDF documents need a PDF extractor"
            )));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| ExtractError::InvalidFormat(format!("{name}: not UTF-8 text ({e})")))?;

        if text.contains('\0') {
            return Err(ExtractError::InvalidFormat(format!("{name}: binary content")));
        }

        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Ok(text.replace("\r\n", "\n"))
    }
}

/// Extractor for PDF documents
///
/// Page texts are joined with a blank line. Pages without text are skipped.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    max_bytes: usize,
}

impl PdfExtractor {
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENT_BYTES)
    }
}

fn pdf_text(bytes: &[u8], name: &str) -> Result<String, ExtractError> {
    let invalid = |e: lopdf::Error| ExtractError::InvalidFormat(format!("{name}: {e}"));

    let document = lopdf::Document::load_mem(bytes).map_err(invalid)?;
    let mut pages = Vec::new();
    for page in document.get_pages().into_keys() {
        let text = document.extract_text(&[page]).map_err(invalid)?;
        let text = text.trim();
        if !text.is_empty() {
            pages.push(text.to_string());
        }
    }

    if pages.is_empty() {
        return Err(ExtractError::InvalidFormat(format!("{name}: no extractable text")));
    }
    Ok(pages.join("\n\n"))
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, bytes: &[u8], name: &str) -> Result<String, ExtractError> {
        if bytes.len() > self.max_bytes {
            return Err(ExtractError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let bytes = bytes.to_vec();
        let owned_name = name.to_string();
        let text = tokio::task::spawn_blocking(move || pdf_text(&bytes, &owned_name))
            .await
            .map_err(|e| ExtractError::InvalidFormat(format!("{name}: {e}")))??;

        tracing::debug!(name, chars = text.len(), "extracted PDF text");
        Ok(text)
    }
}

/// Extractor that picks PDF or plain text by the document's magic bytes
#[derive(Debug, Clone, Default)]
pub struct AnyDocumentExtractor {
    pdf: PdfExtractor,
    text: PlainTextExtractor,
}

impl AnyDocumentExtractor {
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self {
            pdf: PdfExtractor::new(max_bytes),
            text: PlainTextExtractor::new(max_bytes),
        }
    }
}

#[async_trait]
impl DocumentExtractor for AnyDocumentExtractor {
    async fn extract(&self, bytes: &[u8], name: &str) -> Result<String, ExtractError> {
        if bytes.starts_with(b"%PDF") {
            self.pdf.extract(bytes, name).await
        } else {
            self.text.extract(bytes, name).await
        }
    }
}
