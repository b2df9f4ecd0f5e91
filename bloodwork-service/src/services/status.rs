//! Read model over the append-only processing update log.

use crate::models::{DocumentStatus, Phase, ProcessingUpdate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: DocumentStatus,
    pub progress: u8,
    pub current_phase: Option<Phase>,
    pub current_message: Option<String>,
    pub thought_process: Option<String>,
    pub details: serde_json::Value,
}

/// Derive the current status from the full set of update rows for one
/// document. The row with the highest phase rank wins (later rows break
/// ties), not the latest timestamp: throttled best-effort writes can land
/// out of wall-clock order.
pub fn aggregate_status(updates: &[ProcessingUpdate]) -> StatusSummary {
    let mut current: Option<&ProcessingUpdate> = None;
    let mut thought_process: Option<String> = None;

    for update in updates {
        let better = match current {
            None => true,
            Some(best) => update.phase.rank() >= best.phase.rank(),
        };
        if better {
            current = Some(update);
        }
        if let Some(text) = update.details.get("thought_process").and_then(|v| v.as_str()) {
            thought_process = Some(text.to_string());
        }
    }

    match current {
        None => StatusSummary {
            status: DocumentStatus::Pending,
            progress: 0,
            current_phase: None,
            current_message: None,
            thought_process: None,
            details: serde_json::Value::Null,
        },
        Some(update) => StatusSummary {
            status: match update.phase {
                Phase::Complete => DocumentStatus::Completed,
                Phase::Error => DocumentStatus::Failed,
                _ => DocumentStatus::Processing,
            },
            progress: update.phase.progress_percent(),
            current_phase: Some(update.phase),
            current_message: Some(update.message.clone()),
            thought_process,
            details: update.details.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(phase: Phase, message: &str, details: serde_json::Value) -> ProcessingUpdate {
        ProcessingUpdate::new("doc-1".to_string(), phase, message.to_string(), details)
    }

    #[test]
    fn empty_log_is_pending() {
        let summary = aggregate_status(&[]);
        assert_eq!(summary.status, DocumentStatus::Pending);
        assert_eq!(summary.progress, 0);
        assert!(summary.current_phase.is_none());
    }

    #[test]
    fn highest_phase_wins_over_insert_order() {
        let updates = vec![
            row(Phase::Queued, "queued", json!({})),
            row(Phase::AiExtraction, "extracting", json!({})),
            // A late, lower-ranked write must not regress the status.
            row(Phase::Download, "downloading", json!({})),
        ];
        let summary = aggregate_status(&updates);
        assert_eq!(summary.current_phase, Some(Phase::AiExtraction));
        assert_eq!(summary.status, DocumentStatus::Processing);
        assert_eq!(summary.progress, 70);
    }

    #[test]
    fn complete_maps_to_completed() {
        let updates = vec![
            row(Phase::Queued, "queued", json!({})),
            row(Phase::Complete, "done", json!({"biomarker_count": 12})),
        ];
        let summary = aggregate_status(&updates);
        assert_eq!(summary.status, DocumentStatus::Completed);
        assert_eq!(summary.progress, 100);
        assert_eq!(summary.details["biomarker_count"], 12);
    }

    #[test]
    fn error_maps_to_failed() {
        let updates = vec![
            row(Phase::Ocr, "ocr", json!({})),
            row(Phase::Error, "boom", json!({"error": "ocr failed"})),
        ];
        let summary = aggregate_status(&updates);
        assert_eq!(summary.status, DocumentStatus::Failed);
    }

    #[test]
    fn thought_process_carried_from_details() {
        let updates = vec![
            row(
                Phase::AiExtraction,
                "thinking",
                json!({"thought_process": "Scanning lipid panel"}),
            ),
            row(Phase::Saving, "saving", json!({})),
        ];
        let summary = aggregate_status(&updates);
        assert_eq!(
            summary.thought_process.as_deref(),
            Some("Scanning lipid panel")
        );
    }
}
