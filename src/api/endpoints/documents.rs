//! Document endpoints: upload, list, detail.
//!
//! `POST /api/upload` stores the file and returns the `PROCESSING` record at
//! once; analysis continues in the background and clients poll the list or
//! detail routes for the terminal status.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::DocumentRecord;

/// Multipart field carrying the document.
const FILE_FIELD: &str = "file";

/// `POST /api/upload`: accept one document and start its analysis.
pub async fn upload(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRecord>), ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or("document").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Upload read failed: {e}")))?;
        upload = Some((original_name, bytes.to_vec()));
        break;
    }

    let (original_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;

    let record = ctx.core.accept_upload(&original_name, &bytes).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/documents`: all records, newest upload first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    Ok(Json(ctx.core.store().list_all()?))
}

/// `GET /api/documents/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid document id: {id}")))?;
    ctx.core
        .store()
        .find_by_id(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))
}
