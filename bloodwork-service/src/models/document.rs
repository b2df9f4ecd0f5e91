use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One uploaded blood-test file. Mutated only by the processing pipeline
/// and the delete endpoint; owned exclusively by the uploading user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub storage_key: String,
    pub status: DocumentStatus,
    /// Last-known errors from the most recent processing run.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub uploaded_at: DateTime<Utc>,
    /// Set when the pipeline first picks the document up.
    pub processed_at: Option<mongodb::bson::DateTime>,
    /// Set when the pipeline reaches a terminal phase.
    pub processing_completed_at: Option<mongodb::bson::DateTime>,
}

impl Document {
    pub fn new(
        owner_id: String,
        original_name: String,
        mime_type: String,
        size: i64,
        storage_key: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            original_name,
            mime_type,
            size,
            storage_key,
            status: DocumentStatus::Pending,
            errors: Vec::new(),
            uploaded_at: Utc::now(),
            processed_at: None,
            processing_completed_at: None,
        }
    }
}
