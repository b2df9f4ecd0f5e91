use anyhow::anyhow;
use async_trait::async_trait;
use service_core::error::AppError;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Error type for provider operations. Structural response errors are kept
/// distinct from transport errors so callers can offer "retry" rather than
/// "wait".
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Stream ended before completion")]
    Incomplete,
}

impl AiError {
    /// Structural errors mean the model produced unusable output; the
    /// appropriate user action is a manual retry, not waiting.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AiError::MalformedResponse(_) | AiError::SchemaMismatch(_) | AiError::Incomplete
        )
    }
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Network(_) => AppError::BadGateway(err.to_string()),
            AiError::NotConfigured(_) => AppError::InternalError(anyhow!(err)),
            _ => AppError::Unprocessable(anyhow!(err)),
        }
    }
}

/// One discrete event from the provider stream.
///
/// Ordering guarantee: deltas precede their corresponding done event.
/// Nothing else about interleaving may be assumed.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Reasoning narration. Useful only for live UX; never parsed as data.
    ReasoningDelta { summary_index: u32, text: String },
    ReasoningDone { summary_index: u32 },
    /// Output text to be concatenated in arrival order and parsed as JSON
    /// once the stream completes.
    OutputDelta(String),
    OutputDone,
    Usage(TokenUsage),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

pub type AiStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, AiError>> + Send>>;

/// A streaming structured-output request.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub prompt: String,
    pub schema_name: String,
    /// Strict JSON schema the output must conform to.
    pub schema: serde_json::Value,
    pub max_output_tokens: Option<i64>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Issue one streaming structured-output request.
    async fn stream_structured(&self, request: &StructuredRequest) -> Result<AiStream, AiError>;

    async fn health_check(&self) -> Result<(), AiError>;

    fn model(&self) -> &str;
}
