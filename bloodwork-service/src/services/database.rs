use crate::models::{Biomarker, BiomarkerReading, Document, HealthAnalysis, ProcessingUpdate, UsageRecord};
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for bloodwork-service");

        let owner_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("owner_id_lookup".to_string())
                    .build(),
            )
            .build();
        self.documents().create_index(owner_index, None).await?;

        let update_index = IndexModel::builder()
            .keys(doc! { "document_id": 1, "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("document_updates_lookup".to_string())
                    .build(),
            )
            .build();
        self.processing_updates()
            .create_index(update_index, None)
            .await?;

        let reading_index = IndexModel::builder()
            .keys(doc! { "document_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("document_readings_lookup".to_string())
                    .build(),
            )
            .build();
        self.biomarker_readings()
            .create_index(reading_index, None)
            .await?;

        let analysis_index = IndexModel::builder()
            .keys(doc! { "document_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("document_analyses_lookup".to_string())
                    .build(),
            )
            .build();
        self.analyses().create_index(analysis_index, None).await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn documents(&self) -> Collection<Document> {
        self.db.collection("documents")
    }

    pub fn processing_updates(&self) -> Collection<ProcessingUpdate> {
        self.db.collection("processing_updates")
    }

    pub fn biomarker_readings(&self) -> Collection<BiomarkerReading> {
        self.db.collection("biomarker_readings")
    }

    pub fn biomarkers(&self) -> Collection<Biomarker> {
        self.db.collection("biomarkers")
    }

    pub fn analyses(&self) -> Collection<HealthAnalysis> {
        self.db.collection("health_analyses")
    }

    pub fn usage_records(&self) -> Collection<UsageRecord> {
        self.db.collection("usage_records")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
