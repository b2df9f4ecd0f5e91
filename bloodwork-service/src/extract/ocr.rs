use super::{ExtractError, Extracted};
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;

/// Client for an OCR.space-style HTTP OCR API.
#[derive(Clone)]
pub struct OcrClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcrResponse {
    #[serde(default)]
    pub parsed_results: Vec<OcrResult>,
    #[serde(default)]
    pub is_errored_on_processing: bool,
    #[serde(default)]
    pub error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcrResult {
    #[serde(default)]
    pub parsed_text: String,
    #[serde(default)]
    pub file_parse_exit_code: i32,
}

impl OcrClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub async fn parse_image(&self, bytes: &[u8], mime_type: &str) -> Result<Extracted, ExtractError> {
        let extension = mime_type.strip_prefix("image/").unwrap_or("png");
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(format!("document.{}", extension))
            .mime_str(mime_type)
            .map_err(|e| ExtractError::Ocr(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("scale", "true")
            .text("OCREngine", "2");

        let url = format!("{}/parse/image", self.base_url);

        tracing::debug!(url = %url, mime_type = %mime_type, size = bytes.len(), "Submitting image for OCR");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractError::Ocr(format!("OCR request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ExtractError::Ocr(format!(
                "OCR service returned {}",
                response.status()
            )));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Ocr(format!("Invalid OCR response: {}", e)))?;

        parse_ocr_response(body)
    }
}

/// Map the OCR service response onto the extraction contract. Confidence is
/// two-tier from the service's own parse exit code: 1 means a clean parse.
pub fn parse_ocr_response(body: OcrResponse) -> Result<Extracted, ExtractError> {
    if body.is_errored_on_processing {
        let message = body
            .error_message
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown OCR error".to_string());
        return Err(ExtractError::Ocr(format!("OCR errored on processing: {}", message)));
    }

    let result = body
        .parsed_results
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::Ocr("OCR returned no parsed results".to_string()))?;

    let confidence = if result.file_parse_exit_code == 1 {
        0.8
    } else {
        0.6
    };

    Ok(Extracted {
        text: result.parsed_text,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_parse_gets_high_confidence() {
        let body = OcrResponse {
            parsed_results: vec![OcrResult {
                parsed_text: "Vitamin D: 32 ng/mL".to_string(),
                file_parse_exit_code: 1,
            }],
            is_errored_on_processing: false,
            error_message: None,
        };
        let out = parse_ocr_response(body).unwrap();
        assert_eq!(out.confidence, 0.8);
        assert!(out.text.contains("Vitamin D"));
    }

    #[test]
    fn partial_parse_gets_lower_confidence() {
        let body = OcrResponse {
            parsed_results: vec![OcrResult {
                parsed_text: "blurry text".to_string(),
                file_parse_exit_code: 2,
            }],
            is_errored_on_processing: false,
            error_message: None,
        };
        assert_eq!(parse_ocr_response(body).unwrap().confidence, 0.6);
    }

    #[test]
    fn errored_on_processing_is_fatal() {
        let body = OcrResponse {
            parsed_results: vec![],
            is_errored_on_processing: true,
            error_message: Some(serde_json::json!(["file unreadable"])),
        };
        let err = parse_ocr_response(body).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));
    }

    #[test]
    fn no_results_is_fatal() {
        let body = OcrResponse {
            parsed_results: vec![],
            is_errored_on_processing: false,
            error_message: None,
        };
        assert!(parse_ocr_response(body).is_err());
    }
}
