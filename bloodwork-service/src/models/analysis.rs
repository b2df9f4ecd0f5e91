use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    Core,
    Supplements,
    Diet,
    Lifestyle,
    Workout,
}

impl AnalysisPhase {
    pub const ALL: [AnalysisPhase; 5] = [
        AnalysisPhase::Core,
        AnalysisPhase::Supplements,
        AnalysisPhase::Diet,
        AnalysisPhase::Lifestyle,
        AnalysisPhase::Workout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Core => "core",
            AnalysisPhase::Supplements => "supplements",
            AnalysisPhase::Diet => "diet",
            AnalysisPhase::Lifestyle => "lifestyle",
            AnalysisPhase::Workout => "workout",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Overall "done" means: every phase present, none pending/processing,
/// and core completed. A failed core is terminal regardless of the rest;
/// other phases failing leaves the analysis usable with partial results.
pub fn overall_done(phases: &HashMap<AnalysisPhase, PhaseStatus>) -> bool {
    if phases.get(&AnalysisPhase::Core) != Some(&PhaseStatus::Completed) {
        return false;
    }
    AnalysisPhase::ALL.iter().all(|p| {
        matches!(
            phases.get(p),
            Some(PhaseStatus::Completed) | Some(PhaseStatus::Failed)
        )
    })
}

// ============================================================================
// Structured analysis output (validated against the LLM response)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallAssessment {
    /// 0-100 composite score.
    pub score: f64,
    /// e.g. "optimal", "good", "needs attention", "concerning".
    pub category: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerInsight {
    pub biomarker: String,
    pub status: String,
    pub interpretation: String,
    #[serde(default)]
    pub related_systems: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCause {
    pub title: String,
    pub explanation: String,
    #[serde(default)]
    pub affected_biomarkers: Vec<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplementRecommendation {
    pub name: String,
    pub dosage: String,
    pub timing: Option<String>,
    pub rationale: String,
    #[serde(default)]
    pub cautions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietRecommendation {
    pub recommendation: String,
    pub rationale: String,
    #[serde(default)]
    pub foods_to_include: Vec<String>,
    #[serde(default)]
    pub foods_to_avoid: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifestyleRecommendation {
    pub recommendation: String,
    pub rationale: String,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutRecommendation {
    pub activity: String,
    pub frequency: String,
    pub intensity: Option<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringItem {
    pub biomarker: String,
    pub retest_interval: String,
    pub target: Option<String>,
}

/// Output of the core analysis call. Recommendation categories are produced
/// by separate per-phase calls and merged in afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreAnalysis {
    pub overall_assessment: OverallAssessment,
    #[serde(default)]
    pub insights: Vec<BiomarkerInsight>,
    #[serde(default)]
    pub root_causes: Vec<RootCause>,
    #[serde(default)]
    pub monitoring_plan: Vec<MonitoringItem>,
    #[serde(default)]
    pub personalization_factors: Vec<String>,
    pub evidence_summary: Option<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Full assembled analysis: core sections plus whichever recommendation
/// phases completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveAnalysis {
    pub overall_assessment: OverallAssessment,
    #[serde(default)]
    pub insights: Vec<BiomarkerInsight>,
    #[serde(default)]
    pub root_causes: Vec<RootCause>,
    #[serde(default)]
    pub supplements: Vec<SupplementRecommendation>,
    #[serde(default)]
    pub diet: Vec<DietRecommendation>,
    #[serde(default)]
    pub lifestyle: Vec<LifestyleRecommendation>,
    #[serde(default)]
    pub workout: Vec<WorkoutRecommendation>,
    #[serde(default)]
    pub monitoring_plan: Vec<MonitoringItem>,
    #[serde(default)]
    pub personalization_factors: Vec<String>,
    pub evidence_summary: Option<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl ComprehensiveAnalysis {
    pub fn from_core(core: CoreAnalysis) -> Self {
        Self {
            overall_assessment: core.overall_assessment,
            insights: core.insights,
            root_causes: core.root_causes,
            supplements: Vec::new(),
            diet: Vec::new(),
            lifestyle: Vec::new(),
            workout: Vec::new(),
            monitoring_plan: core.monitoring_plan,
            personalization_factors: core.personalization_factors,
            evidence_summary: core.evidence_summary,
            next_steps: core.next_steps,
        }
    }
}

/// Demographic profile fed into the analysis prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub health_goals: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

/// One stored LLM-produced assessment tied to a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthAnalysis {
    #[serde(rename = "_id")]
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub status: AnalysisStatus,
    pub result: Option<ComprehensiveAnalysis>,
    /// Per-recommendation-category status, polled independently of `status`.
    pub phase_statuses: HashMap<AnalysisPhase, PhaseStatus>,
    /// Accumulated reasoning narration, surfaced for live UX only.
    pub thought_process: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl HealthAnalysis {
    pub fn new(document_id: String, user_id: String) -> Self {
        let now = Utc::now();
        let phase_statuses = AnalysisPhase::ALL
            .iter()
            .map(|p| (*p, PhaseStatus::Pending))
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            user_id,
            status: AnalysisStatus::Pending,
            result: None,
            phase_statuses,
            thought_process: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
