use crate::dtos::{AnalysisResponse, AnalysisStatusResponse, AnalyzeRequest};
use crate::handlers::documents::find_owned_document;
use crate::middleware::user_id::UserId;
use crate::models::{BiomarkerReading, DocumentStatus};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use service_core::error::AppError;

/// Runs the full analysis inside this request and returns the stored
/// record's terminal state. Callers poll `/analyses/:id/status` in parallel
/// for live phase statuses and reasoning narration.
pub async fn analyze_document(
    State(state): State<AppState>,
    user_id: UserId,
    Path(document_id): Path<String>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let document = find_owned_document(&state, &document_id, &user_id.0).await?;

    if document.status != DocumentStatus::Completed {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Document has not completed processing"
        )));
    }

    let readings: Vec<BiomarkerReading> = state
        .db
        .biomarker_readings()
        .find(doc! { "document_id": &document_id }, None)
        .await?
        .try_collect()
        .await?;

    if readings.is_empty() {
        return Err(AppError::Unprocessable(anyhow::anyhow!(
            "Document has no biomarker readings to analyze"
        )));
    }

    let catalog = state
        .db
        .biomarkers()
        .find(None, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let request = body.map(|Json(r)| r).unwrap_or_default();

    let analysis = state
        .analysis_pipeline()
        .run(
            &document_id,
            &user_id.0,
            &readings,
            &catalog,
            &request.profile,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AnalysisResponse::from(analysis))))
}

pub async fn get_analysis_status(
    State(state): State<AppState>,
    user_id: UserId,
    Path(analysis_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let analysis = state
        .db
        .analyses()
        .find_one(doc! { "_id": &analysis_id, "user_id": &user_id.0 }, None)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Analysis not found")))?;

    Ok(Json(AnalysisStatusResponse::from(analysis)))
}
