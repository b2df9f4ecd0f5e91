use crate::models::{
    overall_done, AnalysisPhase, AnalysisStatus, ComprehensiveAnalysis, HealthAnalysis,
    PhaseStatus, UserProfile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Demographic context for the analysis; defaults to an empty profile.
    #[serde(default)]
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub id: String,
    pub document_id: String,
    pub status: AnalysisStatus,
    pub phase_statuses: HashMap<AnalysisPhase, PhaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ComprehensiveAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<HealthAnalysis> for AnalysisResponse {
    fn from(analysis: HealthAnalysis) -> Self {
        Self {
            id: analysis.id,
            document_id: analysis.document_id,
            status: analysis.status,
            phase_statuses: analysis.phase_statuses,
            result: analysis.result,
            error_message: analysis.error_message,
            created_at: analysis.created_at,
            updated_at: analysis.updated_at,
        }
    }
}

/// Lightweight view for the polling endpoint: no result body, just enough
/// to decide whether to keep polling.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStatusResponse {
    pub id: String,
    pub status: AnalysisStatus,
    pub phase_statuses: HashMap<AnalysisPhase, PhaseStatus>,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<HealthAnalysis> for AnalysisStatusResponse {
    fn from(analysis: HealthAnalysis) -> Self {
        let done = overall_done(&analysis.phase_statuses);
        Self {
            id: analysis.id,
            status: analysis.status,
            phase_statuses: analysis.phase_statuses,
            done,
            thought_process: analysis.thought_process,
            error_message: analysis.error_message,
        }
    }
}
