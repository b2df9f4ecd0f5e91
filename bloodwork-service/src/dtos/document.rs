use crate::models::{Document, DocumentStatus};
use crate::services::StatusSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            original_name: document.original_name,
            mime_type: document.mime_type,
            size: document.size,
            status: document.status,
            errors: document.errors,
            uploaded_at: document.uploaded_at,
            processing_completed_at: document
                .processing_completed_at
                .map(|dt| dt.to_chrono()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListDocumentsParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub status: Option<DocumentStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub document_id: String,
    pub status: DocumentStatus,
    pub readings_saved: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatusResponse {
    pub document_id: String,
    #[serde(flatten)]
    pub summary: StatusSummary,
}
