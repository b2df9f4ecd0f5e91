//! Streaming biomarker extraction.
//!
//! Drives one structured-output stream, forwards reasoning narration to the
//! caller's sink, and parses the concatenated output as JSON only once the
//! stream signals completion. Malformed JSON is fatal with no
//! partial-result recovery; retry is the caller's decision, never ours.

use super::prompts;
use super::provider::{AiError, AiProvider, StructuredRequest, TokenUsage};
use super::stream::{drive_stream, NarrationSink};
use crate::models::Biomarker;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedBiomarker {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub reference_range: Option<String>,
    pub confidence: f64,
    pub source_text: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub biomarkers: Vec<ExtractedBiomarker>,
    pub document_type: Option<String>,
    pub confidence: f64,
    pub notes: Vec<String>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    biomarkers: Vec<ExtractedBiomarker>,
    document_type: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    notes: Vec<String>,
}

#[derive(Clone)]
pub struct BiomarkerExtractionClient {
    provider: Arc<dyn AiProvider>,
}

impl BiomarkerExtractionClient {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub async fn extract(
        &self,
        document_text: &str,
        catalog: &[Biomarker],
        narration: &mut dyn NarrationSink,
    ) -> Result<ExtractionResult, AiError> {
        let request = StructuredRequest {
            prompt: prompts::extraction_prompt(document_text, catalog),
            schema_name: "biomarker_extraction".to_string(),
            schema: prompts::extraction_schema(),
            max_output_tokens: Some(16_000),
        };

        let stream = self.provider.stream_structured(&request).await?;
        let output = drive_stream(stream, narration).await?;

        let result = parse_extraction_output(&output.output)?;

        tracing::info!(
            biomarker_count = result.biomarkers.len(),
            document_type = ?result.document_type,
            "Biomarker extraction completed"
        );

        Ok(ExtractionResult {
            usage: output.usage,
            ..result
        })
    }
}

fn parse_extraction_output(output: &str) -> Result<ExtractionResult, AiError> {
    // Parse loosely first so a missing/mistyped `biomarkers` field is
    // reported as a structural failure, not an empty result.
    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| AiError::MalformedResponse(format!("Extraction output is not JSON: {}", e)))?;

    match value.get("biomarkers") {
        Some(v) if v.is_array() => {}
        Some(_) => {
            return Err(AiError::SchemaMismatch(
                "`biomarkers` is not an array".to_string(),
            ));
        }
        None => {
            return Err(AiError::SchemaMismatch(
                "`biomarkers` field missing".to_string(),
            ));
        }
    }

    let payload: ExtractionPayload = serde_json::from_value(value)
        .map_err(|e| AiError::SchemaMismatch(e.to_string()))?;

    Ok(ExtractionResult {
        biomarkers: payload.biomarkers,
        document_type: payload.document_type,
        confidence: payload.confidence,
        notes: payload.notes,
        usage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockAiProvider;
    use crate::ai::provider::StreamEvent;
    use crate::ai::stream::NullSink;
    use async_trait::async_trait;

    const VALID_PAYLOAD: &str = r#"{
        "biomarkers": [
            {"name": "Vitamin D", "value": 32.0, "unit": "ng/mL",
             "reference_range": "30-100", "confidence": 0.95,
             "source_text": "Vitamin D: 32 ng/mL (30-100)",
             "category": "vitamins", "aliases": ["25-oh-d"]}
        ],
        "document_type": "blood_panel",
        "confidence": 0.9,
        "notes": []
    }"#;

    fn client(provider: MockAiProvider) -> BiomarkerExtractionClient {
        BiomarkerExtractionClient::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn parses_streamed_payload() {
        let client = client(MockAiProvider::returning_json(VALID_PAYLOAD));
        let result = client.extract("text", &[], &mut NullSink).await.unwrap();

        assert_eq!(result.biomarkers.len(), 1);
        assert_eq!(result.biomarkers[0].value, 32.0);
        assert_eq!(result.biomarkers[0].unit, "ng/mL");
        assert_eq!(result.usage.unwrap().input_tokens, 100);
    }

    #[tokio::test]
    async fn split_deltas_parse_like_final_text() {
        let (a, b) = VALID_PAYLOAD.split_at(40);
        let provider = MockAiProvider::with_script(vec![
            Ok(StreamEvent::OutputDelta(a.to_string())),
            Ok(StreamEvent::OutputDelta(b.to_string())),
            Ok(StreamEvent::OutputDone),
            Ok(StreamEvent::Completed),
        ]);
        let result = client(provider)
            .extract("text", &[], &mut NullSink)
            .await
            .unwrap();
        assert_eq!(result.biomarkers.len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_fatal() {
        let client = client(MockAiProvider::returning_json("{\"biomarkers\": [trunc"));
        let err = client.extract("text", &[], &mut NullSink).await.unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse(_)));
        assert!(err.is_structural());
    }

    #[tokio::test]
    async fn missing_biomarkers_field_is_structural_failure() {
        let client = client(MockAiProvider::returning_json("{\"document_type\": \"x\"}"));
        let err = client.extract("text", &[], &mut NullSink).await.unwrap_err();
        assert!(matches!(err, AiError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn non_array_biomarkers_is_structural_failure() {
        let client = client(MockAiProvider::returning_json(
            "{\"biomarkers\": \"none\", \"confidence\": 1.0}",
        ));
        let err = client.extract("text", &[], &mut NullSink).await.unwrap_err();
        assert!(matches!(err, AiError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn stream_without_completion_is_incomplete() {
        let provider = MockAiProvider::with_script(vec![Ok(StreamEvent::OutputDelta(
            VALID_PAYLOAD.to_string(),
        ))]);
        let err = client(provider)
            .extract("text", &[], &mut NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Incomplete));
    }

    struct Recording(Vec<(String, bool)>);

    #[async_trait]
    impl crate::ai::stream::NarrationSink for Recording {
        async fn narrate(&mut self, text: String, complete: bool) {
            self.0.push((text, complete));
        }
    }

    #[tokio::test]
    async fn reasoning_narration_reaches_sink() {
        let provider = MockAiProvider::with_script(vec![
            Ok(StreamEvent::ReasoningDelta {
                summary_index: 0,
                text: "reading the panel".to_string(),
            }),
            Ok(StreamEvent::ReasoningDone { summary_index: 0 }),
            Ok(StreamEvent::OutputDelta(VALID_PAYLOAD.to_string())),
            Ok(StreamEvent::Completed),
        ]);
        let mut sink = Recording(Vec::new());
        client(provider)
            .extract("text", &[], &mut sink)
            .await
            .unwrap();

        assert!(sink
            .0
            .iter()
            .any(|(text, complete)| *complete && text == "reading the panel"));
    }
}
