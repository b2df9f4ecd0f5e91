//! The health analysis run: one core call plus four independent
//! recommendation-category calls.
//!
//! A failed core call is terminal for the whole analysis. A failed category
//! call marks only that phase failed; the assembled result keeps whatever
//! the other phases produced. Thought-process narration is written onto the
//! analysis record, throttled, best-effort.

use crate::ai::{AnalysisOrchestrator, NarrationSink};
use crate::models::{
    AnalysisPhase, AnalysisStatus, Biomarker, BiomarkerReading, ComprehensiveAnalysis,
    HealthAnalysis, PhaseStatus, UsageRecord, UserProfile,
};
use crate::services::{AnalysisStore, UsageTracker};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;

const RECOMMENDATION_PHASES: [AnalysisPhase; 4] = [
    AnalysisPhase::Supplements,
    AnalysisPhase::Diet,
    AnalysisPhase::Lifestyle,
    AnalysisPhase::Workout,
];

pub struct AnalysisPipeline {
    store: Arc<dyn AnalysisStore>,
    orchestrator: AnalysisOrchestrator,
    usage: Option<UsageTracker>,
    throttle: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        orchestrator: AnalysisOrchestrator,
        throttle: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            usage: None,
            throttle,
        }
    }

    pub fn with_usage(mut self, usage: UsageTracker) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Run one analysis over already-loaded readings. The caller is
    /// responsible for ownership checks and for loading readings, catalog,
    /// and profile.
    pub async fn run(
        &self,
        document_id: &str,
        user_id: &str,
        readings: &[BiomarkerReading],
        catalog: &[Biomarker],
        profile: &UserProfile,
    ) -> Result<HealthAnalysis, AppError> {
        let mut analysis = HealthAnalysis::new(document_id.to_string(), user_id.to_string());
        self.store.insert(&analysis).await?;

        analysis.status = AnalysisStatus::Processing;
        self.store
            .set_status(&analysis.id, AnalysisStatus::Processing, None)
            .await?;
        self.set_phase(&mut analysis, AnalysisPhase::Core, PhaseStatus::Processing)
            .await?;

        let mut narrator =
            AnalysisNarrator::new(self.store.clone(), analysis.id.clone(), self.throttle);

        let core = match self
            .orchestrator
            .analyze_core(readings, catalog, profile, &mut narrator)
            .await
        {
            Ok((core, usage)) => {
                narrator.flush().await;
                self.record_usage(document_id, &analysis.id, usage).await;
                self.set_phase(&mut analysis, AnalysisPhase::Core, PhaseStatus::Completed)
                    .await?;
                core
            }
            Err(err) => {
                narrator.flush().await;
                let message = err.to_string();
                tracing::error!(
                    analysis_id = %analysis.id,
                    error = %message,
                    "Core analysis failed"
                );
                self.set_phase(&mut analysis, AnalysisPhase::Core, PhaseStatus::Failed)
                    .await?;
                self.store
                    .set_status(&analysis.id, AnalysisStatus::Failed, Some(&message))
                    .await?;
                return Err(AppError::from(err));
            }
        };

        let core_summary = core.overall_assessment.summary.clone();
        let mut assembled = ComprehensiveAnalysis::from_core(core);

        for phase in RECOMMENDATION_PHASES {
            self.set_phase(&mut analysis, phase, PhaseStatus::Processing)
                .await?;

            match self
                .orchestrator
                .recommend(phase, &core_summary, readings, catalog, profile, &mut narrator)
                .await
            {
                Ok((recommendations, usage)) => {
                    narrator.flush().await;
                    self.record_usage(document_id, &analysis.id, usage).await;
                    recommendations.apply_to(&mut assembled);
                    self.set_phase(&mut analysis, phase, PhaseStatus::Completed)
                        .await?;
                }
                Err(err) => {
                    narrator.flush().await;
                    tracing::warn!(
                        analysis_id = %analysis.id,
                        phase = phase.as_str(),
                        error = %err,
                        "Recommendation phase failed, continuing"
                    );
                    self.set_phase(&mut analysis, phase, PhaseStatus::Failed)
                        .await?;
                }
            }
        }

        self.store.set_result(&analysis.id, &assembled).await?;
        self.store
            .set_status(&analysis.id, AnalysisStatus::Completed, None)
            .await?;

        analysis.status = AnalysisStatus::Completed;
        analysis.result = Some(assembled);
        analysis.thought_process = narrator.into_transcript();
        Ok(analysis)
    }

    async fn set_phase(
        &self,
        analysis: &mut HealthAnalysis,
        phase: AnalysisPhase,
        status: PhaseStatus,
    ) -> Result<(), AppError> {
        analysis.phase_statuses.insert(phase, status);
        self.store.set_phase(&analysis.id, phase, status).await
    }

    async fn record_usage(
        &self,
        document_id: &str,
        analysis_id: &str,
        usage: Option<crate::ai::TokenUsage>,
    ) {
        let (Some(tracker), Some(usage)) = (&self.usage, usage) else {
            return;
        };
        tracker
            .record(UsageRecord::new(
                analysis_id.to_string(),
                document_id.to_string(),
                self.orchestrator.model().to_string(),
                "analysis".to_string(),
                usage.input_tokens,
                usage.output_tokens,
            ))
            .await;
    }
}

/// Writes streamed reasoning onto the analysis record. Complete summaries
/// extend the stored transcript immediately; partial accumulations are
/// throttled. Every write is best-effort.
struct AnalysisNarrator {
    store: Arc<dyn AnalysisStore>,
    analysis_id: String,
    interval: Duration,
    last_write: Option<tokio::time::Instant>,
    transcript: String,
    pending: Option<String>,
}

impl AnalysisNarrator {
    fn new(store: Arc<dyn AnalysisStore>, analysis_id: String, interval: Duration) -> Self {
        Self {
            store,
            analysis_id,
            interval,
            last_write: None,
            transcript: String::new(),
            pending: None,
        }
    }

    async fn write(&mut self, text: &str) {
        self.last_write = Some(tokio::time::Instant::now());
        if let Err(e) = self
            .store
            .set_thought_process(&self.analysis_id, text)
            .await
        {
            tracing::warn!(
                analysis_id = %self.analysis_id,
                error = %e,
                "Thought process write failed, continuing"
            );
        }
    }

    async fn flush(&mut self) {
        if let Some(text) = self.pending.take() {
            self.write(&text).await;
        }
    }

    fn combined_with(&self, partial: &str) -> String {
        if self.transcript.is_empty() {
            partial.to_string()
        } else {
            format!("{}\n\n{}", self.transcript, partial)
        }
    }

    fn into_transcript(self) -> Option<String> {
        if self.transcript.is_empty() {
            None
        } else {
            Some(self.transcript)
        }
    }
}

#[async_trait::async_trait]
impl NarrationSink for AnalysisNarrator {
    async fn narrate(&mut self, text: String, complete_summary: bool) {
        if complete_summary {
            if !self.transcript.is_empty() {
                self.transcript.push_str("\n\n");
            }
            self.transcript.push_str(&text);
            self.pending = None;
            let full = self.transcript.clone();
            self.write(&full).await;
            return;
        }

        let combined = self.combined_with(&text);
        let now = tokio::time::Instant::now();
        let due = match self.last_write {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.pending = None;
            self.write(&combined).await;
        } else {
            self.pending = Some(combined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{AiError, StreamEvent, TokenUsage};
    use crate::ai::MockAiProvider;
    use crate::models::overall_done;
    use crate::services::MemoryAnalysisStore;

    const CORE_JSON: &str = r#"{
        "overall_assessment": {"score": 70.0, "category": "good", "summary": "Broadly fine."},
        "insights": [],
        "root_causes": [],
        "monitoring_plan": [],
        "personalization_factors": [],
        "evidence_summary": null,
        "next_steps": []
    }"#;

    fn json_script(json: &str) -> Vec<Result<StreamEvent, AiError>> {
        vec![
            Ok(StreamEvent::OutputDelta(json.to_string())),
            Ok(StreamEvent::OutputDone),
            Ok(StreamEvent::Usage(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            })),
            Ok(StreamEvent::Completed),
        ]
    }

    fn category_script(category: &str) -> Vec<Result<StreamEvent, AiError>> {
        json_script(&format!("{{\"{}\": []}}", category))
    }

    fn pipeline(provider: MockAiProvider, store: Arc<MemoryAnalysisStore>) -> AnalysisPipeline {
        AnalysisPipeline::new(
            store,
            AnalysisOrchestrator::new(Arc::new(provider)),
            Duration::from_millis(400),
        )
    }

    #[tokio::test]
    async fn all_phases_complete_on_happy_path() {
        let store = Arc::new(MemoryAnalysisStore::default());
        let provider = MockAiProvider::with_scripts(vec![
            json_script(CORE_JSON),
            category_script("supplements"),
            category_script("diet"),
            category_script("lifestyle"),
            category_script("workout"),
        ]);

        let analysis = pipeline(provider, store.clone())
            .run("doc-1", "user-1", &[], &[], &UserProfile::default())
            .await
            .unwrap();

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert!(overall_done(&analysis.phase_statuses));
        assert!(analysis.result.is_some());

        let stored = store.get(&analysis.id).unwrap();
        assert_eq!(stored.status, AnalysisStatus::Completed);
        assert!(stored.result.is_some());
    }

    #[tokio::test]
    async fn core_failure_is_terminal() {
        let store = Arc::new(MemoryAnalysisStore::default());
        // Core output missing its required sections.
        let provider = MockAiProvider::with_scripts(vec![json_script("{\"insights\": []}")]);

        let err = pipeline(provider, store.clone())
            .run("doc-1", "user-1", &[], &[], &UserProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));

        let stored = store.records.lock().unwrap().values().next().cloned().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Failed);
        assert_eq!(
            stored.phase_statuses.get(&AnalysisPhase::Core),
            Some(&PhaseStatus::Failed)
        );
        // Recommendation phases were never attempted.
        assert_eq!(
            stored.phase_statuses.get(&AnalysisPhase::Diet),
            Some(&PhaseStatus::Pending)
        );
        assert!(stored.result.is_none());
        assert!(stored.error_message.is_some());
    }

    #[tokio::test]
    async fn failed_category_leaves_partial_result() {
        let store = Arc::new(MemoryAnalysisStore::default());
        let provider = MockAiProvider::with_scripts(vec![
            json_script(CORE_JSON),
            // Supplements call returns the wrong shape.
            json_script("{\"wrong\": []}"),
            category_script("diet"),
            category_script("lifestyle"),
            category_script("workout"),
        ]);

        let analysis = pipeline(provider, store.clone())
            .run("doc-1", "user-1", &[], &[], &UserProfile::default())
            .await
            .unwrap();

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(
            analysis.phase_statuses.get(&AnalysisPhase::Supplements),
            Some(&PhaseStatus::Failed)
        );
        assert_eq!(
            analysis.phase_statuses.get(&AnalysisPhase::Workout),
            Some(&PhaseStatus::Completed)
        );
        assert!(overall_done(&analysis.phase_statuses));
        assert!(analysis.result.unwrap().supplements.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_mid_category_is_not_terminal() {
        let store = Arc::new(MemoryAnalysisStore::default());
        let provider = MockAiProvider::with_scripts(vec![
            json_script(CORE_JSON),
            category_script("supplements"),
            vec![Err(AiError::Network("connection reset".to_string()))],
            category_script("lifestyle"),
            category_script("workout"),
        ]);

        let analysis = pipeline(provider, store)
            .run("doc-1", "user-1", &[], &[], &UserProfile::default())
            .await
            .unwrap();

        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(
            analysis.phase_statuses.get(&AnalysisPhase::Diet),
            Some(&PhaseStatus::Failed)
        );
    }

    #[tokio::test]
    async fn narration_lands_on_stored_record() {
        let store = Arc::new(MemoryAnalysisStore::default());
        let mut core_script = vec![
            Ok(StreamEvent::ReasoningDelta {
                summary_index: 0,
                text: "weighing the markers".to_string(),
            }),
            Ok(StreamEvent::ReasoningDone { summary_index: 0 }),
        ];
        core_script.extend(json_script(CORE_JSON));

        let provider = MockAiProvider::with_scripts(vec![
            core_script,
            category_script("supplements"),
            category_script("diet"),
            category_script("lifestyle"),
            category_script("workout"),
        ]);

        let analysis = pipeline(provider, store.clone())
            .run("doc-1", "user-1", &[], &[], &UserProfile::default())
            .await
            .unwrap();

        let stored = store.get(&analysis.id).unwrap();
        assert_eq!(
            stored.thought_process.as_deref(),
            Some("weighing the markers")
        );
    }
}
