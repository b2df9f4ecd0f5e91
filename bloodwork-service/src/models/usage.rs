//! Token usage accounting for LLM calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record of token usage for a single streamed request. Written
/// best-effort out-of-band; a failed write never affects the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "_id")]
    pub id: String,

    /// Request ID for correlation.
    pub request_id: String,

    /// Document the call was made for.
    pub document_id: String,

    /// Model that was used.
    pub model: String,

    /// "extraction" or "analysis".
    pub operation: String,

    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,

    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        request_id: String,
        document_id: String,
        model: String,
        operation: String,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id,
            document_id,
            model,
            operation,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            timestamp: Utc::now(),
        }
    }
}
