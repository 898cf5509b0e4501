//! # Files API
//!
//! | Method   | Path               | Success                                   |
//! |----------|--------------------|-------------------------------------------|
//! | `POST`   | `/files`           | 201 `{"file_hash": ...}` + `Location`     |
//! | `GET`    | `/files/{digest}`  | 200, blob streamed as an attachment       |
//! | `DELETE` | `/files/{digest}`  | 204                                       |
//!
//! Uploads are multipart. The first part carrying a non-empty filename is
//! streamed straight into the store; other parts are skipped. The request
//! body size is unbounded.

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Body of a successful upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Digest naming the stored blob.
    pub file_hash: String,
}

/// Build the files router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/files",
            post(upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/files/{digest}", get(download_file).delete(delete_file))
}

/// POST /files — store the uploaded file part under its digest.
async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::Validation(e.to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if field.file_name().map_or(true, str::is_empty) {
            continue;
        }
        let outcome = state.store.put(field).await?;
        let file_hash = outcome.digest().to_string();
        return Ok((
            StatusCode::CREATED,
            [(header::LOCATION, format!("/files/{file_hash}"))],
            Json(UploadResponse { file_hash }),
        )
            .into_response());
    }

    Err(AppError::Validation(
        "multipart body has no file part".to_string(),
    ))
}

/// GET /files/{digest} — stream a stored blob.
async fn download_file(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> Result<Response, AppError> {
    let reader = state.store.fetch(&digest).await?;
    let disposition = format!("attachment; filename={}", reader.digest());

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(reader.into_stream()),
    )
        .into_response())
}

/// DELETE /files/{digest} — remove a stored blob.
async fn delete_file(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.remove(&digest).await?;
    Ok(StatusCode::NO_CONTENT)
}
