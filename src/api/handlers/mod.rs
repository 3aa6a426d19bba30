use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{ApiError, AppState};
use crate::app::*;
use crate::models::*;

type Created<T> = (StatusCode, [(header::HeaderName, String); 1], Json<T>);

fn created<T>(location: String, body: T) -> Created<T> {
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body))
}

fn no_content_or_not_found(removed: bool) -> Result<StatusCode, ApiError> {
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Captures
// ============================================================

pub async fn list_captures(State(state): State<AppState>) -> Result<Json<Vec<Capture>>, ApiError> {
    state.send(GetCaptures).await.map(Json)
}

pub async fn get_capture(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Capture>, ApiError> {
    state
        .send(GetCaptureById { id })
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn create_capture(
    State(state): State<AppState>,
    Json(input): Json<CreateCaptureInput>,
) -> Result<Created<Capture>, ApiError> {
    let capture = state.send(CreateCapture { input }).await?;
    Ok(created(format!("/api/captures/{}", capture.id), capture))
}

pub async fn update_capture(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCaptureInput>,
) -> Result<Json<Capture>, ApiError> {
    state
        .send(UpdateCapture { id, input })
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn delete_capture(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    no_content_or_not_found(state.send(DeleteCapture { id }).await?)
}

// ============================================================
// Collections
// ============================================================

pub async fn list_collections(
    State(state): State<AppState>,
) -> Result<Json<Vec<Collection>>, ApiError> {
    state.send(GetCollections).await.map(Json)
}

pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Collection>, ApiError> {
    state
        .send(GetCollectionById { id })
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn create_collection(
    State(state): State<AppState>,
    Json(input): Json<CreateCollectionInput>,
) -> Result<Created<Collection>, ApiError> {
    let collection = state.send(CreateCollection { input }).await?;
    Ok(created(
        format!("/api/collections/{}", collection.id),
        collection,
    ))
}

pub async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCollectionInput>,
) -> Result<Json<Collection>, ApiError> {
    state
        .send(UpdateCollection { id, input })
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    no_content_or_not_found(state.send(DeleteCollection { id }).await?)
}

// ============================================================
// Type Inference
// ============================================================

pub async fn infer_type(
    State(state): State<AppState>,
    Json(input): Json<InferTypeInput>,
) -> Result<Json<TypeInference>, ApiError> {
    state.send(InferType { input }).await.map(Json)
}

/// Accepts a correction. The response is empty; nothing is stored.
pub async fn confirm_type(
    State(state): State<AppState>,
    Json(confirmation): Json<TypeConfirmation>,
) -> Result<StatusCode, ApiError> {
    state.send(ConfirmType { confirmation }).await?;
    Ok(StatusCode::OK)
}
