use super::ExtractError;

/// Parse the PDF text layer in-process. Corrupt files and scanned-image-only
/// PDFs surface as fatal extraction errors.
pub fn extract_text_layer(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(ExtractError::Pdf(
            "PDF has no extractable text layer".to_string(),
        ));
    }

    Ok(text)
}
