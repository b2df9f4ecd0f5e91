//! Format-specific text extraction.
//!
//! MIME dispatch happens exactly once, at the top: each branch implements the
//! same `(bytes) -> (text, confidence)` contract. Unsupported types fail fast
//! before any network or storage access.

mod ocr;
mod pdf;

pub use ocr::{OcrClient, OcrResponse, OcrResult};

use anyhow::anyhow;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("document produced no text")]
    EmptyText,
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedType(_) => AppError::BadRequest(anyhow!(err)),
            _ => AppError::Unprocessable(anyhow!(err)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    /// In [0, 1]. PDF text layers are exact; OCR confidence is two-tier
    /// from the service's own parse exit code.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Pdf,
    Image,
}

impl ExtractorKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(ExtractorKind::Pdf),
            "image/jpeg" | "image/png" | "image/webp" | "image/gif" | "image/bmp"
            | "image/tiff" => Some(ExtractorKind::Image),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct TextExtractor {
    ocr: OcrClient,
}

impl TextExtractor {
    pub fn new(ocr: OcrClient) -> Self {
        Self { ocr }
    }

    pub async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<Extracted, ExtractError> {
        let kind = ExtractorKind::from_mime(mime_type)
            .ok_or_else(|| ExtractError::UnsupportedType(mime_type.to_string()))?;

        let extracted = match kind {
            // Text-layer parse only. A scanned-image PDF with no text layer
            // is a fatal error for the run; there is no OCR fallback here.
            ExtractorKind::Pdf => {
                let text = pdf::extract_text_layer(bytes)?;
                Extracted {
                    text,
                    confidence: 1.0,
                }
            }
            ExtractorKind::Image => self.ocr.parse_image(bytes, mime_type).await?,
        };

        if extracted.text.trim().is_empty() {
            return Err(ExtractError::EmptyText);
        }
        Ok(extracted)
    }
}
