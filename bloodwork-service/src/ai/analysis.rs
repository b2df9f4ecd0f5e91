//! Streaming health analysis, split into a core call plus one call per
//! recommendation category.
//!
//! The core call produces the assessment, insights, root causes and
//! monitoring plan; the four category calls (supplements, diet, lifestyle,
//! workout) each produce one recommendation list and can fail without
//! sinking the whole analysis. The supplement restriction to
//! natural/nutraceutical substances is enforced at the prompt level only;
//! no server-side filter rejects a pharmaceutical name if the model
//! violates the instruction.

use super::prompts;
use super::provider::{AiError, AiProvider, StructuredRequest, TokenUsage};
use super::stream::{drive_stream, NarrationSink};
use crate::models::{
    analysis::UserProfile, AnalysisPhase, Biomarker, BiomarkerReading, ComprehensiveAnalysis,
    CoreAnalysis,
};
use std::sync::Arc;

/// One completed recommendation-category call.
#[derive(Debug, Clone)]
pub enum CategoryRecommendations {
    Supplements(Vec<crate::models::analysis::SupplementRecommendation>),
    Diet(Vec<crate::models::analysis::DietRecommendation>),
    Lifestyle(Vec<crate::models::analysis::LifestyleRecommendation>),
    Workout(Vec<crate::models::analysis::WorkoutRecommendation>),
}

impl CategoryRecommendations {
    pub fn apply_to(self, analysis: &mut ComprehensiveAnalysis) {
        match self {
            CategoryRecommendations::Supplements(items) => analysis.supplements = items,
            CategoryRecommendations::Diet(items) => analysis.diet = items,
            CategoryRecommendations::Lifestyle(items) => analysis.lifestyle = items,
            CategoryRecommendations::Workout(items) => analysis.workout = items,
        }
    }
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    provider: Arc<dyn AiProvider>,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub async fn analyze_core(
        &self,
        readings: &[BiomarkerReading],
        catalog: &[Biomarker],
        profile: &UserProfile,
        narration: &mut dyn NarrationSink,
    ) -> Result<(CoreAnalysis, Option<TokenUsage>), AiError> {
        let request = StructuredRequest {
            prompt: prompts::core_analysis_prompt(readings, catalog, profile),
            schema_name: "core_analysis".to_string(),
            schema: prompts::core_analysis_schema(),
            max_output_tokens: Some(32_000),
        };

        let stream = self.provider.stream_structured(&request).await?;
        let output = drive_stream(stream, narration).await?;

        let core = parse_structured::<CoreAnalysis>(&output.output, "Core analysis")?;

        tracing::info!(
            score = core.overall_assessment.score,
            insight_count = core.insights.len(),
            "Core analysis completed"
        );

        Ok((core, output.usage))
    }

    pub async fn recommend(
        &self,
        phase: AnalysisPhase,
        core_summary: &str,
        readings: &[BiomarkerReading],
        catalog: &[Biomarker],
        profile: &UserProfile,
        narration: &mut dyn NarrationSink,
    ) -> Result<(CategoryRecommendations, Option<TokenUsage>), AiError> {
        let category = match phase {
            AnalysisPhase::Core => {
                return Err(AiError::NotConfigured(
                    "core is not a recommendation category".to_string(),
                ));
            }
            other => other.as_str(),
        };

        let request = StructuredRequest {
            prompt: prompts::category_prompt(category, core_summary, readings, catalog, profile),
            schema_name: format!("{}_recommendations", category),
            schema: prompts::category_schema(category),
            max_output_tokens: Some(8_000),
        };

        let stream = self.provider.stream_structured(&request).await?;
        let output = drive_stream(stream, narration).await?;

        let value: serde_json::Value = serde_json::from_str(&output.output).map_err(|e| {
            AiError::MalformedResponse(format!("{} output is not JSON: {}", category, e))
        })?;
        let items = value
            .get(category)
            .cloned()
            .ok_or_else(|| AiError::SchemaMismatch(format!("`{}` field missing", category)))?;

        let recommendations = match phase {
            AnalysisPhase::Supplements => CategoryRecommendations::Supplements(
                serde_json::from_value(items).map_err(|e| AiError::SchemaMismatch(e.to_string()))?,
            ),
            AnalysisPhase::Diet => CategoryRecommendations::Diet(
                serde_json::from_value(items).map_err(|e| AiError::SchemaMismatch(e.to_string()))?,
            ),
            AnalysisPhase::Lifestyle => CategoryRecommendations::Lifestyle(
                serde_json::from_value(items).map_err(|e| AiError::SchemaMismatch(e.to_string()))?,
            ),
            AnalysisPhase::Workout => CategoryRecommendations::Workout(
                serde_json::from_value(items).map_err(|e| AiError::SchemaMismatch(e.to_string()))?,
            ),
            AnalysisPhase::Core => {
                return Err(AiError::NotConfigured(
                    "core is not a recommendation category".to_string(),
                ));
            }
        };

        tracing::info!(category, "Recommendation category completed");

        Ok((recommendations, output.usage))
    }
}

fn parse_structured<T: serde::de::DeserializeOwned>(
    output: &str,
    label: &str,
) -> Result<T, AiError> {
    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| AiError::MalformedResponse(format!("{} output is not JSON: {}", label, e)))?;

    serde_json::from_value(value).map_err(|e| AiError::SchemaMismatch(e.to_string()))
}
