//! The document processing run: validation, download, text extraction,
//! streaming biomarker extraction, and persistence of matched readings.
//!
//! The run executes inside the triggering request; there is no queue and no
//! automatic retry. Each phase appends a progress row before its work
//! starts, so a crash leaves the last recorded phase as the visible status.
//! Any phase error records a terminal `error` row, pushes the message onto
//! the document, and propagates to the caller.

use crate::ai::BiomarkerExtractionClient;
use crate::extract::{ExtractorKind, TextExtractor};
use crate::models::{BiomarkerReading, Document, DocumentStatus, Phase, UsageRecord};
use crate::services::{
    classify_severity, match_reading, DocumentStore, ProgressRecorder, Storage, ThrottledProgress,
    UsageTracker,
};
use anyhow::anyhow;
use serde_json::json;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;

/// Error messages stored on documents and progress rows are capped so a
/// deeply nested error chain cannot bloat the record.
const MAX_ERROR_LEN: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct ProcessingOutcome {
    pub readings_saved: usize,
    pub matched: usize,
}

pub struct DocumentPipeline {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn Storage>,
    extractor: TextExtractor,
    extraction: BiomarkerExtractionClient,
    progress: ProgressRecorder,
    usage: Option<UsageTracker>,
    throttle: Duration,
}

impl DocumentPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn Storage>,
        extractor: TextExtractor,
        extraction: BiomarkerExtractionClient,
        progress: ProgressRecorder,
        throttle: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            extractor,
            extraction,
            progress,
            usage: None,
            throttle,
        }
    }

    pub fn with_usage(mut self, usage: UsageTracker) -> Self {
        self.usage = Some(usage);
        self
    }

    pub async fn run(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<ProcessingOutcome, AppError> {
        let document = self
            .store
            .find_document(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("document {} not found", document_id)))?;

        // Ownership mismatch reads as not-found so document IDs do not leak.
        if document.owner_id != user_id {
            return Err(AppError::NotFound(anyhow!(
                "document {} not found",
                document_id
            )));
        }

        if document.status == DocumentStatus::Processing {
            return Err(AppError::Conflict(anyhow!(
                "document {} is already being processed",
                document_id
            )));
        }

        self.progress
            .report(document_id, Phase::Queued, "Queued for processing", json!({}))
            .await;

        let started = std::time::Instant::now();
        match self.process(&document).await {
            Ok(outcome) => {
                metrics::histogram!("document_processing_duration_seconds", "outcome" => "completed")
                    .record(started.elapsed().as_secs_f64());
                Ok(outcome)
            }
            Err(err) => {
                metrics::histogram!("document_processing_duration_seconds", "outcome" => "failed")
                    .record(started.elapsed().as_secs_f64());
                self.record_failure(document_id, &err).await;
                Err(err)
            }
        }
    }

    async fn process(&self, document: &Document) -> Result<ProcessingOutcome, AppError> {
        let id = document.id.as_str();

        self.progress
            .report(
                id,
                Phase::Validation,
                "Validating document",
                json!({ "mime_type": document.mime_type }),
            )
            .await;
        if ExtractorKind::from_mime(&document.mime_type).is_none() {
            return Err(AppError::BadRequest(anyhow!(
                "unsupported file type: {}",
                document.mime_type
            )));
        }

        self.progress
            .report(id, Phase::Download, "Fetching document from storage", json!({}))
            .await;
        let bytes = self.storage.download(&document.storage_key).await?;

        self.progress
            .report(id, Phase::Ocr, "Extracting text", json!({}))
            .await;
        let extracted = self.extractor.extract(&bytes, &document.mime_type).await?;

        self.progress
            .report(
                id,
                Phase::AiExtraction,
                "Extracting biomarkers",
                json!({
                    "text_length": extracted.text.len(),
                    "extraction_confidence": extracted.confidence,
                }),
            )
            .await;
        let catalog = self.store.load_catalog().await?;
        let mut sink = ProgressSink::new(ThrottledProgress::new(
            self.progress.clone(),
            id.to_string(),
            self.throttle,
        ));
        let result = self
            .extraction
            .extract(&extracted.text, &catalog, &mut sink)
            .await?;
        sink.flush().await;

        if let (Some(usage), Some(tracker)) = (result.usage, &self.usage) {
            tracker
                .record(UsageRecord::new(
                    uuid::Uuid::new_v4().to_string(),
                    id.to_string(),
                    self.extraction.model().to_string(),
                    "extraction".to_string(),
                    usage.input_tokens,
                    usage.output_tokens,
                ))
                .await;
        }

        self.progress
            .report(
                id,
                Phase::Saving,
                "Saving biomarker readings",
                json!({ "extracted": result.biomarkers.len() }),
            )
            .await;

        let mut readings = Vec::with_capacity(result.biomarkers.len());
        let mut matched = 0;
        for item in &result.biomarkers {
            let entry = match_reading(&item.name, &catalog);
            if entry.is_some() {
                matched += 1;
            }
            let severity = classify_severity(item.value, entry);
            readings.push(BiomarkerReading::new(
                id.to_string(),
                entry.map(|b| b.id.clone()),
                item.name.clone(),
                item.value,
                item.unit.clone(),
                item.reference_range.clone(),
                item.confidence,
                severity,
            ));
        }
        if !readings.is_empty() {
            self.store.insert_readings(&readings).await?;
        }

        self.progress
            .report(
                id,
                Phase::Complete,
                "Processing complete",
                json!({
                    "readings_saved": readings.len(),
                    "matched": matched,
                    "document_type": result.document_type,
                }),
            )
            .await;

        Ok(ProcessingOutcome {
            readings_saved: readings.len(),
            matched,
        })
    }

    async fn record_failure(&self, document_id: &str, err: &AppError) {
        let message = truncate_message(&err.to_string(), MAX_ERROR_LEN);

        self.progress
            .report(
                document_id,
                Phase::Error,
                &message,
                json!({ "error": message }),
            )
            .await;

        if let Err(e) = self.store.append_error(document_id, &message).await {
            tracing::warn!(
                document_id = %document_id,
                error = %e,
                "Failed to append error to document"
            );
        }
    }
}

fn truncate_message(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

/// Bridges reasoning narration into throttled progress rows. Complete
/// summaries are appended to a running transcript and always persisted;
/// partial accumulations ride the throttle and may be coalesced away.
pub struct ProgressSink {
    throttled: ThrottledProgress,
    transcript: String,
}

impl ProgressSink {
    pub fn new(throttled: ThrottledProgress) -> Self {
        Self {
            throttled,
            transcript: String::new(),
        }
    }

    pub async fn flush(&mut self) {
        self.throttled.flush().await;
    }

    fn combined_with(&self, partial: &str) -> String {
        if self.transcript.is_empty() {
            partial.to_string()
        } else {
            format!("{}\n\n{}", self.transcript, partial)
        }
    }
}

#[async_trait::async_trait]
impl crate::ai::NarrationSink for ProgressSink {
    async fn narrate(&mut self, text: String, complete_summary: bool) {
        if complete_summary {
            if !self.transcript.is_empty() {
                self.transcript.push_str("\n\n");
            }
            self.transcript.push_str(&text);
            self.throttled
                .push(
                    Phase::AiExtraction,
                    "Analyzing document".to_string(),
                    json!({ "thought_process": self.transcript }),
                )
                .await;
            // A finished summary must reach the store even mid-throttle.
            self.throttled.flush().await;
        } else {
            let combined = self.combined_with(&text);
            self.throttled
                .push(
                    Phase::AiExtraction,
                    "Analyzing document".to_string(),
                    json!({ "thought_process": combined }),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::NarrationSink;
    use crate::services::{MemoryProgressStore, ProgressStore};

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_message("short", 500), "short");

        let long = "é".repeat(300);
        let truncated = truncate_message(&long, 499);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 502);
    }

    fn sink(store: &Arc<MemoryProgressStore>, throttle_ms: u64) -> ProgressSink {
        let recorder = ProgressRecorder::new(store.clone() as Arc<dyn ProgressStore>);
        ProgressSink::new(ThrottledProgress::new(
            recorder,
            "doc-1".to_string(),
            Duration::from_millis(throttle_ms),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn complete_summaries_always_persist() {
        let store = Arc::new(MemoryProgressStore::default());
        let mut sink = sink(&store, 400);

        sink.narrate("first summary".to_string(), true).await;
        sink.narrate("second summary".to_string(), true).await;

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        let last = updates[1].details["thought_process"].as_str().unwrap();
        assert_eq!(last, "first summary\n\nsecond summary");
    }

    #[tokio::test(start_paused = true)]
    async fn partial_narration_is_coalesced() {
        let store = Arc::new(MemoryProgressStore::default());
        let mut sink = sink(&store, 400);

        sink.narrate("thinking".to_string(), false).await;
        sink.narrate("thinking more".to_string(), false).await;
        sink.narrate("thinking even more".to_string(), false).await;
        assert_eq!(store.updates.lock().unwrap().len(), 1);

        sink.flush().await;
        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        let last = updates[1].details["thought_process"].as_str().unwrap();
        assert_eq!(last, "thinking even more");
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_prefixes_partial_narration() {
        let store = Arc::new(MemoryProgressStore::default());
        let mut sink = sink(&store, 0);

        sink.narrate("done one".to_string(), true).await;
        sink.narrate("partial two".to_string(), false).await;

        let updates = store.updates.lock().unwrap();
        let last = updates
            .last()
            .unwrap()
            .details["thought_process"]
            .as_str()
            .unwrap();
        assert_eq!(last, "done one\n\npartial two");
    }
}
