//! Document-side persistence used by the processing pipeline.
//!
//! The pipeline talks to documents, the biomarker catalog, and saved
//! readings only through this trait so its full run can be exercised
//! against the in-memory implementation.

use crate::models::{Biomarker, BiomarkerReading, Document};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use service_core::error::AppError;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_document(&self, document_id: &str) -> Result<Option<Document>, AppError>;

    /// The catalog is re-read per call; an administrative update takes
    /// effect on the next run without a restart.
    async fn load_catalog(&self) -> Result<Vec<Biomarker>, AppError>;

    async fn insert_readings(&self, readings: &[BiomarkerReading]) -> Result<(), AppError>;

    async fn append_error(&self, document_id: &str, message: &str) -> Result<(), AppError>;
}

pub struct MongoDocumentStore {
    documents: Collection<Document>,
    biomarkers: Collection<Biomarker>,
    readings: Collection<BiomarkerReading>,
}

impl MongoDocumentStore {
    pub fn new(db: &crate::services::MongoDb) -> Self {
        Self {
            documents: db.documents(),
            biomarkers: db.biomarkers(),
            readings: db.biomarker_readings(),
        }
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find_document(&self, document_id: &str) -> Result<Option<Document>, AppError> {
        let document = self
            .documents
            .find_one(doc! { "_id": document_id }, None)
            .await?;
        Ok(document)
    }

    async fn load_catalog(&self) -> Result<Vec<Biomarker>, AppError> {
        let catalog = self.biomarkers.find(None, None).await?.try_collect().await?;
        Ok(catalog)
    }

    async fn insert_readings(&self, readings: &[BiomarkerReading]) -> Result<(), AppError> {
        self.readings.insert_many(readings, None).await?;
        Ok(())
    }

    async fn append_error(&self, document_id: &str, message: &str) -> Result<(), AppError> {
        self.documents
            .update_one(
                doc! { "_id": document_id },
                doc! { "$push": { "errors": message } },
                None,
            )
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and local experimentation.
#[derive(Default)]
pub struct MemoryDocumentStore {
    pub documents: std::sync::Mutex<std::collections::HashMap<String, Document>>,
    pub catalog: std::sync::Mutex<Vec<Biomarker>>,
    pub readings: std::sync::Mutex<Vec<BiomarkerReading>>,
}

impl MemoryDocumentStore {
    pub fn insert_document(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id.clone(), document);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_document(&self, document_id: &str) -> Result<Option<Document>, AppError> {
        Ok(self.documents.lock().unwrap().get(document_id).cloned())
    }

    async fn load_catalog(&self) -> Result<Vec<Biomarker>, AppError> {
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn insert_readings(&self, readings: &[BiomarkerReading]) -> Result<(), AppError> {
        self.readings.lock().unwrap().extend_from_slice(readings);
        Ok(())
    }

    async fn append_error(&self, document_id: &str, message: &str) -> Result<(), AppError> {
        if let Some(document) = self.documents.lock().unwrap().get_mut(document_id) {
            document.errors.push(message.to_string());
        }
        Ok(())
    }
}
