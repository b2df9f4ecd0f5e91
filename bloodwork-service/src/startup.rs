use crate::ai::{AiProvider, AnalysisOrchestrator, BiomarkerExtractionClient};
use crate::config::BloodworkConfig;
use crate::extract::TextExtractor;
use crate::handlers;
use crate::pipeline::{AnalysisPipeline, DocumentPipeline};
use crate::services::{
    LocalStorage, MongoAnalysisStore, MongoDb, MongoDocumentStore, MongoProgressStore,
    ProgressRecorder, Storage, UsageTracker,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: BloodworkConfig,
    pub db: MongoDb,
    pub storage: Arc<dyn Storage>,
    pub extractor: TextExtractor,
    pub provider: Arc<dyn AiProvider>,
}

impl AppState {
    /// Pipelines are assembled per request; everything they hold is either a
    /// cheap clone or an `Arc`.
    pub fn document_pipeline(&self) -> DocumentPipeline {
        let progress = ProgressRecorder::new(Arc::new(MongoProgressStore::new(&self.db)));
        DocumentPipeline::new(
            Arc::new(MongoDocumentStore::new(&self.db)),
            self.storage.clone(),
            self.extractor.clone(),
            BiomarkerExtractionClient::new(self.provider.clone()),
            progress,
            self.config.pipeline.progress_throttle(),
        )
        .with_usage(UsageTracker::new(self.db.clone()))
    }

    pub fn analysis_pipeline(&self) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Arc::new(MongoAnalysisStore::new(&self.db)),
            AnalysisOrchestrator::new(self.provider.clone()),
            self.config.pipeline.progress_throttle(),
        )
        .with_usage(UsageTracker::new(self.db.clone()))
    }
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(
        config: BloodworkConfig,
        provider: Arc<dyn AiProvider>,
    ) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    e
                })?,
        );

        let extractor = TextExtractor::new(crate::extract::OcrClient::new(
            config.ocr.base_url.clone(),
            config.ocr.api_key.clone(),
        ));

        let state = AppState {
            config: config.clone(),
            db,
            storage,
            extractor,
            provider,
        };

        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn db(&self) -> &MongoDb {
        &self.state.db
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

/// Multipart framing adds headers and boundaries on top of the file bytes,
/// so the transport limit sits above the configured file cap; the upload
/// handler still enforces the exact cap on the file itself. Without this
/// layer axum's 2MB default would reject large uploads before the handler
/// ever sees them.
const UPLOAD_BODY_OVERHEAD: usize = 64 * 1024;

pub(crate) fn upload_body_limit(max_file_size_bytes: i64) -> usize {
    max_file_size_bytes.max(0) as usize + UPLOAD_BODY_OVERHEAD
}

pub fn router(state: AppState) -> Router {
    let body_limit = upload_body_limit(state.config.pipeline.max_file_size_bytes);
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/documents",
            post(handlers::upload_document).get(handlers::list_documents),
        )
        .route(
            "/documents/:id",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .route("/documents/:id/process", post(handlers::process_document))
        .route("/documents/:id/status", get(handlers::get_document_status))
        .route("/documents/:id/analyze", post(handlers::analyze_document))
        .route("/analyses/:id/status", get(handlers::get_analysis_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
