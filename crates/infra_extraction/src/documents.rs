//! Filesystem document source
//!
//! Reads police reports and similar documents from disk. Plain text is read
//! as UTF-8. PDF text is extracted page by page; a PDF that cannot be parsed
//! or carries no text layer is decoded lossily instead.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use core_kernel::{DomainPort, PortError};
use domain_intake::DocumentSource;

use crate::error::ExtractionError;

/// Document source reading files by path
#[derive(Debug, Clone, Default)]
pub struct FileDocumentSource {
    max_chars: Option<usize>,
}

impl FileDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncates loaded text to at most `max_chars` characters
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    async fn read(&self, path: &Path) -> Result<String, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let text = match extension.as_str() {
            "txt" | "md" => tokio::fs::read_to_string(path).await?,
            "pdf" => {
                let bytes = tokio::fs::read(path).await?;
                read_pdf(bytes).await
            }
            other => {
                let kind = if other.is_empty() { "(none)" } else { other };
                return Err(ExtractionError::UnsupportedFormat(kind.to_string()));
            }
        };

        Ok(match self.max_chars {
            Some(limit) => text.chars().take(limit).collect(),
            None => text,
        })
    }
}

async fn read_pdf(bytes: Vec<u8>) -> String {
    let parsed = tokio::task::spawn_blocking(move || {
        let text = pdf_page_text(&bytes);
        (text, bytes)
    })
    .await;

    match parsed {
        Ok((Ok(text), _)) if !text.is_empty() => text,
        Ok((result, bytes)) => {
            match result {
                Err(error) => warn!(error = %error, "PDF could not be parsed, decoding raw bytes"),
                Ok(_) => warn!("PDF has no text layer, decoding raw bytes"),
            }
            decode_lossy(&bytes)
        }
        Err(error) => {
            warn!(error = %error, "PDF parsing task failed");
            String::new()
        }
    }
}

/// Text of every page, trimmed, non-empty pages joined by newlines
fn pdf_page_text(bytes: &[u8]) -> Result<String, lopdf::Error> {
    let document = lopdf::Document::load_mem(bytes)?;
    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let text = document.extract_text(&[page_number])?;
        let text = text.trim();
        if !text.is_empty() {
            pages.push(text.to_string());
        }
    }
    Ok(pages.join("\n"))
}

/// UTF-8 if valid, otherwise Latin-1
fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

impl DomainPort for FileDocumentSource {}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    #[instrument(skip(self))]
    async fn load(&self, source: &str) -> Result<String, PortError> {
        let text = self.read(Path::new(source)).await?;
        debug!(chars = text.chars().count(), "document loaded");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lossy_falls_back_to_latin1() {
        assert_eq!(decode_lossy("Zürich".as_bytes()), "Zürich");
        assert_eq!(decode_lossy(&[0x5a, 0xfc, 0x72]), "Zür");
    }

    #[test]
    fn test_garbage_is_not_a_pdf() {
        assert!(pdf_page_text(b"%PDF-1.7 truncated").is_err());
    }
}
