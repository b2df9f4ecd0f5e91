use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named stage of a processing run. The declaration order is the canonical
/// phase ordering: "current status" is the highest-ranked phase recorded,
/// not the most recently written row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Queued,
    Validation,
    Download,
    Ocr,
    AiExtraction,
    Saving,
    Complete,
    Error,
}

impl Phase {
    pub fn rank(&self) -> u8 {
        match self {
            Phase::Queued => 0,
            Phase::Validation => 1,
            Phase::Download => 2,
            Phase::Ocr => 3,
            Phase::AiExtraction => 4,
            Phase::Saving => 5,
            Phase::Complete => 6,
            Phase::Error => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }

    /// Fixed per-phase progress percentage surfaced to the poller.
    pub fn progress_percent(&self) -> u8 {
        match self {
            Phase::Queued => 5,
            Phase::Validation => 10,
            Phase::Download => 20,
            Phase::Ocr => 40,
            Phase::AiExtraction => 70,
            Phase::Saving => 90,
            Phase::Complete => 100,
            Phase::Error => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Queued => "queued",
            Phase::Validation => "validation",
            Phase::Download => "download",
            Phase::Ocr => "ocr",
            Phase::AiExtraction => "ai_extraction",
            Phase::Saving => "saving",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }
}

/// Append-only audit row for one processing step. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingUpdate {
    #[serde(rename = "_id")]
    pub id: String,
    pub document_id: String,
    pub phase: Phase,
    pub message: String,
    /// Free-form payload: partial reasoning text, counts, confidence.
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ProcessingUpdate {
    pub fn new(
        document_id: String,
        phase: Phase,
        message: String,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            phase,
            message,
            details,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ranks_are_strictly_increasing() {
        let phases = [
            Phase::Queued,
            Phase::Validation,
            Phase::Download,
            Phase::Ocr,
            Phase::AiExtraction,
            Phase::Saving,
            Phase::Complete,
            Phase::Error,
        ];
        for pair in phases.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(Phase::Complete.is_terminal());
        assert!(Phase::Error.is_terminal());
        assert!(!Phase::Saving.is_terminal());
        assert!(!Phase::Queued.is_terminal());
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::AiExtraction).unwrap();
        assert_eq!(json, "\"ai_extraction\"");
    }
}
