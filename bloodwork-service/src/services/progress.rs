//! Append-only progress recording with best-effort semantics.
//!
//! A failed progress write must never abort the pipeline: `record` returns
//! a `ProgressError` that every call site logs and discards. Each write also
//! mirrors the coarse document status so the status endpoint can serve a
//! summary without scanning the update log.

use crate::models::{Document, DocumentStatus, Phase, ProcessingUpdate};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Collection;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress write failed: {0}")]
    Write(String),
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn append(&self, update: ProcessingUpdate) -> Result<(), ProgressError>;

    async fn set_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        terminal: bool,
    ) -> Result<(), ProgressError>;
}

pub struct MongoProgressStore {
    updates: Collection<ProcessingUpdate>,
    documents: Collection<Document>,
}

impl MongoProgressStore {
    pub fn new(db: &crate::services::MongoDb) -> Self {
        Self {
            updates: db.processing_updates(),
            documents: db.documents(),
        }
    }
}

#[async_trait]
impl ProgressStore for MongoProgressStore {
    async fn append(&self, update: ProcessingUpdate) -> Result<(), ProgressError> {
        self.updates
            .insert_one(&update, None)
            .await
            .map_err(|e| ProgressError::Write(e.to_string()))?;
        Ok(())
    }

    async fn set_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        terminal: bool,
    ) -> Result<(), ProgressError> {
        let status_bson = mongodb::bson::to_bson(&status)
            .map_err(|e| ProgressError::Write(e.to_string()))?;
        let now = mongodb::bson::DateTime::from_chrono(Utc::now());

        let mut set = doc! { "status": status_bson, "processed_at": now };
        if terminal {
            set.insert("processing_completed_at", now);
        }

        self.documents
            .update_one(doc! { "_id": document_id }, doc! { "$set": set }, None)
            .await
            .map_err(|e| ProgressError::Write(e.to_string()))?;
        Ok(())
    }
}

/// Appends one structured status row per processing step and mirrors the
/// coarse status onto the parent document.
#[derive(Clone)]
pub struct ProgressRecorder {
    store: Arc<dyn ProgressStore>,
}

impl ProgressRecorder {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        document_id: &str,
        phase: Phase,
        message: &str,
        details: serde_json::Value,
    ) -> Result<(), ProgressError> {
        let update = ProcessingUpdate::new(
            document_id.to_string(),
            phase,
            message.to_string(),
            details,
        );
        self.store.append(update).await?;

        let status = match phase {
            Phase::Complete => DocumentStatus::Completed,
            Phase::Error => DocumentStatus::Failed,
            _ => DocumentStatus::Processing,
        };
        self.store
            .set_document_status(document_id, status, phase.is_terminal())
            .await
    }

    /// Record and log-and-discard any failure. This is the form almost every
    /// pipeline call site uses.
    pub async fn report(
        &self,
        document_id: &str,
        phase: Phase,
        message: &str,
        details: serde_json::Value,
    ) {
        if let Err(e) = self.record(document_id, phase, message, details).await {
            tracing::warn!(
                document_id = %document_id,
                phase = %phase.as_str(),
                error = %e,
                "Progress write failed, continuing"
            );
        }
    }
}

/// Coalesces high-frequency writes (reasoning-stream deltas) so the store
/// sees at most one write per throttle interval. The latest payload always
/// wins; `flush` pushes whatever is still pending.
pub struct ThrottledProgress {
    recorder: ProgressRecorder,
    document_id: String,
    interval: Duration,
    last_write: Option<tokio::time::Instant>,
    pending: Option<(Phase, String, serde_json::Value)>,
}

impl ThrottledProgress {
    pub fn new(recorder: ProgressRecorder, document_id: String, interval: Duration) -> Self {
        Self {
            recorder,
            document_id,
            interval,
            last_write: None,
            pending: None,
        }
    }

    pub async fn push(&mut self, phase: Phase, message: String, details: serde_json::Value) {
        let now = tokio::time::Instant::now();
        let due = match self.last_write {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };

        if due {
            self.last_write = Some(now);
            self.pending = None;
            self.recorder
                .report(&self.document_id, phase, &message, details)
                .await;
        } else {
            self.pending = Some((phase, message, details));
        }
    }

    /// Write the last coalesced payload, if any.
    pub async fn flush(&mut self) {
        if let Some((phase, message, details)) = self.pending.take() {
            self.last_write = Some(tokio::time::Instant::now());
            self.recorder
                .report(&self.document_id, phase, &message, details)
                .await;
        }
    }
}

/// In-memory store for tests and local experimentation.
#[derive(Default)]
pub struct MemoryProgressStore {
    pub updates: std::sync::Mutex<Vec<ProcessingUpdate>>,
    pub statuses: std::sync::Mutex<Vec<(String, DocumentStatus, bool)>>,
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn append(&self, update: ProcessingUpdate) -> Result<(), ProgressError> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }

    async fn set_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        terminal: bool,
    ) -> Result<(), ProgressError> {
        self.statuses
            .lock()
            .unwrap()
            .push((document_id.to_string(), status, terminal));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder(store: &Arc<MemoryProgressStore>) -> ProgressRecorder {
        ProgressRecorder::new(store.clone() as Arc<dyn ProgressStore>)
    }

    #[tokio::test]
    async fn record_appends_and_mirrors_status() {
        let store = Arc::new(MemoryProgressStore::default());
        let rec = recorder(&store);

        rec.record("doc-1", Phase::Download, "Downloading", json!({}))
            .await
            .unwrap();
        rec.record("doc-1", Phase::Complete, "Done", json!({"count": 3}))
            .await
            .unwrap();

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].phase, Phase::Download);

        let statuses = store.statuses.lock().unwrap();
        assert_eq!(statuses[0].1, DocumentStatus::Processing);
        assert!(!statuses[0].2);
        assert_eq!(statuses[1].1, DocumentStatus::Completed);
        assert!(statuses[1].2);
    }

    #[tokio::test]
    async fn error_phase_marks_document_failed() {
        let store = Arc::new(MemoryProgressStore::default());
        let rec = recorder(&store);

        rec.record("doc-1", Phase::Error, "boom", json!({}))
            .await
            .unwrap();

        let statuses = store.statuses.lock().unwrap();
        assert_eq!(statuses[0].1, DocumentStatus::Failed);
        assert!(statuses[0].2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_coalesces_rapid_pushes() {
        let store = Arc::new(MemoryProgressStore::default());
        let mut throttled = ThrottledProgress::new(
            recorder(&store),
            "doc-1".to_string(),
            Duration::from_millis(400),
        );

        // First push writes immediately.
        throttled
            .push(Phase::AiExtraction, "thinking 1".into(), json!({}))
            .await;
        // Within the window: coalesced, latest wins.
        throttled
            .push(Phase::AiExtraction, "thinking 2".into(), json!({}))
            .await;
        throttled
            .push(Phase::AiExtraction, "thinking 3".into(), json!({}))
            .await;
        assert_eq!(store.updates.lock().unwrap().len(), 1);

        tokio::time::advance(Duration::from_millis(450)).await;
        throttled
            .push(Phase::AiExtraction, "thinking 4".into(), json!({}))
            .await;
        assert_eq!(store.updates.lock().unwrap().len(), 2);

        let messages: Vec<String> = store
            .updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.message.clone())
            .collect();
        assert_eq!(messages, vec!["thinking 1", "thinking 4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_pending_payload() {
        let store = Arc::new(MemoryProgressStore::default());
        let mut throttled = ThrottledProgress::new(
            recorder(&store),
            "doc-1".to_string(),
            Duration::from_millis(400),
        );

        throttled
            .push(Phase::AiExtraction, "first".into(), json!({}))
            .await;
        throttled
            .push(Phase::AiExtraction, "last".into(), json!({}))
            .await;
        throttled.flush().await;

        let messages: Vec<String> = store
            .updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.message.clone())
            .collect();
        assert_eq!(messages, vec!["first", "last"]);
    }
}
