//! Scripted mock provider for tests and local development.

use super::provider::{
    AiError, AiProvider, AiStream, StreamEvent, StructuredRequest, TokenUsage,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// Returns pre-scripted event streams regardless of the request, one script
/// per call. Once the scripts run out, further calls fail with
/// `NotConfigured`.
pub struct MockAiProvider {
    scripts: Mutex<Vec<Vec<Result<StreamEvent, AiError>>>>,
}

impl MockAiProvider {
    pub fn with_script(events: Vec<Result<StreamEvent, AiError>>) -> Self {
        Self {
            scripts: Mutex::new(vec![events]),
        }
    }

    /// Queue several scripts, consumed one per call in order.
    pub fn with_scripts(scripts: Vec<Vec<Result<StreamEvent, AiError>>>) -> Self {
        let mut reversed = scripts;
        reversed.reverse();
        Self {
            scripts: Mutex::new(reversed),
        }
    }

    /// A stream that emits `json` as a single output delta and completes.
    pub fn returning_json(json: &str) -> Self {
        Self::with_script(vec![
            Ok(StreamEvent::OutputDelta(json.to_string())),
            Ok(StreamEvent::OutputDone),
            Ok(StreamEvent::Usage(TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            })),
            Ok(StreamEvent::Completed),
        ])
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn stream_structured(&self, _request: &StructuredRequest) -> Result<AiStream, AiError> {
        let events = self
            .scripts
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| AiError::NotConfigured("mock script exhausted".to_string()))?;
        Ok(Box::pin(tokio_stream::iter(events)))
    }

    async fn health_check(&self) -> Result<(), AiError> {
        Ok(())
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
