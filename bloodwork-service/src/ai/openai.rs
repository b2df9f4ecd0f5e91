//! OpenAI-style streaming structured-output provider.
//!
//! Issues one request against the responses endpoint with a strict JSON
//! schema and parses the SSE byte stream into discrete `StreamEvent`s.

use super::provider::{
    AiError, AiProvider, AiStream, StreamEvent, StructuredRequest, TokenUsage,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn stream_structured(&self, request: &StructuredRequest) -> Result<AiStream, AiError> {
        let body = json!({
            "model": self.config.model,
            "input": request.prompt,
            "stream": true,
            "reasoning": { "summary": "auto" },
            "max_output_tokens": request.max_output_tokens,
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.schema,
                }
            },
        });

        let url = format!("{}/responses", self.config.base_url);

        tracing::debug!(
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            schema = %request.schema_name,
            "Starting streaming request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Api(format!("API error {}: {}", status, error_text)));
        }

        // Create channel for streaming
        let (tx, rx) = mpsc::channel(32);

        // Spawn task to process SSE stream
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));

                        // Process complete SSE events
                        while let Some(event_end) = buffer.find("\n\n") {
                            let raw = buffer[..event_end].to_string();
                            buffer = buffer[event_end + 2..].to_string();

                            for event in parse_sse_event(&raw) {
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(AiError::Network(e.to_string()))).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as AiStream)
    }

    async fn health_check(&self) -> Result<(), AiError> {
        if self.config.api_key.is_empty() {
            return Err(AiError::NotConfigured("API key not configured".to_string()));
        }

        let url = format!("{}/models", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AiError::Api(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Deserialize)]
struct SseData {
    #[serde(default)]
    summary_index: Option<u32>,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    response: Option<SseResponse>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseResponse {
    #[serde(default)]
    usage: Option<SseUsage>,
}

#[derive(Debug, Deserialize)]
struct SseUsage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

/// Parse one raw SSE event block (`event:` and `data:` lines) into zero or
/// more stream events. Unknown event types are skipped.
fn parse_sse_event(raw: &str) -> Vec<Result<StreamEvent, AiError>> {
    let mut event_type = None;
    let mut data = None;

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event_type = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = Some(rest);
        }
    }

    let (Some(event_type), Some(data)) = (event_type, data) else {
        return Vec::new();
    };

    let parsed: SseData = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            return vec![Err(AiError::MalformedResponse(format!(
                "Invalid SSE payload for {}: {}",
                event_type, e
            )))];
        }
    };

    match event_type {
        "response.reasoning_summary_text.delta" => vec![Ok(StreamEvent::ReasoningDelta {
            summary_index: parsed.summary_index.unwrap_or(0),
            text: parsed.delta.unwrap_or_default(),
        })],
        "response.reasoning_summary_text.done" => vec![Ok(StreamEvent::ReasoningDone {
            summary_index: parsed.summary_index.unwrap_or(0),
        })],
        "response.output_text.delta" => {
            vec![Ok(StreamEvent::OutputDelta(parsed.delta.unwrap_or_default()))]
        }
        "response.output_text.done" => vec![Ok(StreamEvent::OutputDone)],
        "response.completed" => {
            let mut events = Vec::new();
            if let Some(usage) = parsed.response.and_then(|r| r.usage) {
                events.push(Ok(StreamEvent::Usage(TokenUsage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                })));
            }
            events.push(Ok(StreamEvent::Completed));
            events
        }
        "response.failed" | "error" => vec![Err(AiError::Api(
            parsed
                .message
                .unwrap_or_else(|| "provider reported failure".to_string()),
        ))],
        _ => Vec::new(),
    }
}
