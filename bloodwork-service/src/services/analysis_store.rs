//! Persistence for health analysis records.
//!
//! The analysis pipeline mutates one record many times per run (status,
//! per-phase statuses, streamed thought process, final result). Hiding the
//! writes behind a trait keeps the pipeline runnable against an in-memory
//! store.

use crate::models::{
    AnalysisPhase, AnalysisStatus, ComprehensiveAnalysis, HealthAnalysis, PhaseStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{doc, to_bson};
use mongodb::Collection;
use service_core::error::AppError;

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert(&self, analysis: &HealthAnalysis) -> Result<(), AppError>;

    async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError>;

    async fn set_phase(
        &self,
        analysis_id: &str,
        phase: AnalysisPhase,
        status: PhaseStatus,
    ) -> Result<(), AppError>;

    async fn set_result(
        &self,
        analysis_id: &str,
        result: &ComprehensiveAnalysis,
    ) -> Result<(), AppError>;

    async fn set_thought_process(&self, analysis_id: &str, text: &str) -> Result<(), AppError>;
}

pub struct MongoAnalysisStore {
    analyses: Collection<HealthAnalysis>,
}

impl MongoAnalysisStore {
    pub fn new(db: &crate::services::MongoDb) -> Self {
        Self {
            analyses: db.analyses(),
        }
    }

    fn now() -> mongodb::bson::DateTime {
        mongodb::bson::DateTime::from_chrono(Utc::now())
    }
}

#[async_trait]
impl AnalysisStore for MongoAnalysisStore {
    async fn insert(&self, analysis: &HealthAnalysis) -> Result<(), AppError> {
        self.analyses.insert_one(analysis, None).await?;
        Ok(())
    }

    async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let status_bson =
            to_bson(&status).map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
        let mut set = doc! { "status": status_bson, "updated_at": Self::now() };
        if let Some(message) = error_message {
            set.insert("error_message", message);
        }
        self.analyses
            .update_one(doc! { "_id": analysis_id }, doc! { "$set": set }, None)
            .await?;
        Ok(())
    }

    async fn set_phase(
        &self,
        analysis_id: &str,
        phase: AnalysisPhase,
        status: PhaseStatus,
    ) -> Result<(), AppError> {
        let status_bson =
            to_bson(&status).map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
        self.analyses
            .update_one(
                doc! { "_id": analysis_id },
                doc! { "$set": {
                    format!("phase_statuses.{}", phase.as_str()): status_bson,
                    "updated_at": Self::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_result(
        &self,
        analysis_id: &str,
        result: &ComprehensiveAnalysis,
    ) -> Result<(), AppError> {
        let result_bson =
            to_bson(result).map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
        self.analyses
            .update_one(
                doc! { "_id": analysis_id },
                doc! { "$set": { "result": result_bson, "updated_at": Self::now() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_thought_process(&self, analysis_id: &str, text: &str) -> Result<(), AppError> {
        self.analyses
            .update_one(
                doc! { "_id": analysis_id },
                doc! { "$set": { "thought_process": text, "updated_at": Self::now() } },
                None,
            )
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and local experimentation.
#[derive(Default)]
pub struct MemoryAnalysisStore {
    pub records: std::sync::Mutex<std::collections::HashMap<String, HealthAnalysis>>,
}

impl MemoryAnalysisStore {
    pub fn get(&self, analysis_id: &str) -> Option<HealthAnalysis> {
        self.records.lock().unwrap().get(analysis_id).cloned()
    }
}

#[async_trait]
impl AnalysisStore for MemoryAnalysisStore {
    async fn insert(&self, analysis: &HealthAnalysis) -> Result<(), AppError> {
        self.records
            .lock()
            .unwrap()
            .insert(analysis.id.clone(), analysis.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(analysis_id) {
            record.status = status;
            if let Some(message) = error_message {
                record.error_message = Some(message.to_string());
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_phase(
        &self,
        analysis_id: &str,
        phase: AnalysisPhase,
        status: PhaseStatus,
    ) -> Result<(), AppError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(analysis_id) {
            record.phase_statuses.insert(phase, status);
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_result(
        &self,
        analysis_id: &str,
        result: &ComprehensiveAnalysis,
    ) -> Result<(), AppError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(analysis_id) {
            record.result = Some(result.clone());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_thought_process(&self, analysis_id: &str, text: &str) -> Result<(), AppError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(analysis_id) {
            record.thought_process = Some(text.to_string());
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}
