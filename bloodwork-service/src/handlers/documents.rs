use crate::dtos::{
    DocumentResponse, DocumentStatusResponse, ListDocumentsParams, ListDocumentsResponse,
    ProcessResponse,
};
use crate::extract::ExtractorKind;
use crate::middleware::user_id::UserId;
use crate::models::{Document, DocumentStatus};
use crate::services::aggregate_status;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use service_core::error::AppError;
use uuid::Uuid;

pub async fn upload_document(
    State(state): State<AppState>,
    user_id: UserId,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })?
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    let original_name = field.file_name().unwrap_or("unnamed").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    // Only formats the extractor can handle are accepted; everything else is
    // rejected before any bytes are stored.
    if ExtractorKind::from_mime(&mime_type).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported file type: {} (PDF and common image formats only)",
            mime_type
        )));
    }

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
        .to_vec();

    let size = data.len() as i64;
    let max_size = state.config.pipeline.max_file_size_bytes;
    if size > max_size {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File too large: {} bytes (max {})",
            size,
            max_size
        )));
    }
    if size == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!("Empty file")));
    }

    let extension = std::path::Path::new(&original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");
    let storage_key = format!("{}/{}.{}", user_id.0, Uuid::new_v4(), extension);

    let document = Document::new(
        user_id.0,
        original_name,
        mime_type,
        size,
        storage_key.clone(),
    );

    tracing::info!(
        document_id = %document.id,
        filename = %document.original_name,
        size = %size,
        "Document upload started"
    );

    state.storage.upload(&storage_key, data).await.map_err(|e| {
        tracing::error!("Failed to upload file {} to storage: {}", storage_key, e);
        e
    })?;

    state
        .db
        .documents()
        .insert_one(&document, None)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert document {}: {}", document.id, e);
            AppError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// Runs the full processing pipeline inside this request and returns only on
/// a terminal outcome. Callers poll the status endpoint in parallel for
/// progress.
pub async fn process_document(
    State(state): State<AppState>,
    user_id: UserId,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .document_pipeline()
        .run(&document_id, &user_id.0)
        .await?;

    Ok(Json(ProcessResponse {
        document_id,
        status: DocumentStatus::Completed,
        readings_saved: outcome.readings_saved,
        matched: outcome.matched,
    }))
}

pub async fn get_document_status(
    State(state): State<AppState>,
    user_id: UserId,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    find_owned_document(&state, &document_id, &user_id.0).await?;

    let updates: Vec<_> = state
        .db
        .processing_updates()
        .find(
            doc! { "document_id": &document_id },
            FindOptions::builder().sort(doc! { "created_at": 1 }).build(),
        )
        .await?
        .try_collect()
        .await?;

    Ok(Json(DocumentStatusResponse {
        document_id,
        summary: aggregate_status(&updates),
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    user_id: UserId,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let document = find_owned_document(&state, &document_id, &user_id.0).await?;
    Ok(Json(DocumentResponse::from(document)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    user_id: UserId,
    Query(params): Query<ListDocumentsParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);
    let skip = (page - 1) * page_size;

    let mut filter = doc! { "owner_id": &user_id.0 };
    if let Some(status) = params.status {
        let bson_status = mongodb::bson::to_bson(&status)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;
        filter.insert("status", bson_status);
    }

    let total = state
        .db
        .documents()
        .count_documents(filter.clone(), None)
        .await?;

    let find_options = FindOptions::builder()
        .sort(doc! { "uploaded_at": -1 })
        .skip(skip)
        .limit(page_size as i64)
        .build();

    let documents: Vec<DocumentResponse> = state
        .db
        .documents()
        .find(filter, find_options)
        .await?
        .map_ok(DocumentResponse::from)
        .try_collect()
        .await?;

    let total_pages = (total as f64 / page_size as f64).ceil() as u64;

    Ok(Json(ListDocumentsResponse {
        documents,
        total,
        page,
        page_size,
        total_pages,
    }))
}

/// Removes the blob, the document, and every row derived from it.
pub async fn delete_document(
    State(state): State<AppState>,
    user_id: UserId,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let document = find_owned_document(&state, &document_id, &user_id.0).await?;

    state.storage.delete(&document.storage_key).await?;

    state
        .db
        .documents()
        .delete_one(doc! { "_id": &document_id }, None)
        .await?;
    state
        .db
        .processing_updates()
        .delete_many(doc! { "document_id": &document_id }, None)
        .await?;
    state
        .db
        .biomarker_readings()
        .delete_many(doc! { "document_id": &document_id }, None)
        .await?;
    state
        .db
        .analyses()
        .delete_many(doc! { "document_id": &document_id }, None)
        .await?;

    tracing::info!(document_id = %document_id, "Document deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a document scoped to its owner. Ownership mismatch reads as
/// not-found so document IDs do not leak across users.
pub(crate) async fn find_owned_document(
    state: &AppState,
    document_id: &str,
    user_id: &str,
) -> Result<Document, AppError> {
    state
        .db
        .documents()
        .find_one(doc! { "_id": document_id, "owner_id": user_id }, None)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))
}
