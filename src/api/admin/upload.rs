use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Extension, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

pub fn upload_router(max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD))
}

/// Stores the first file field under a fresh uuid name and returns its public URL.
async fn upload(
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.file_name().is_none() {
            continue;
        }

        let content_type = field
            .content_type()
            .ok_or_else(|| ApiError::BadRequest("Content type is not set.".into()))?;
        let extension = allowed_extension(content_type)
            .ok_or_else(|| ApiError::BadRequest("Unsupported content type.".into()))?;

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty.".into()));
        }
        if data.len() > state.config.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge);
        }

        let file_name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::create_dir_all(&state.config.upload_dir)
            .await
            .map_err(|err| ApiError::General(format!("Failed to create upload dir: {err}")))?;
        tokio::fs::write(state.config.upload_dir.join(&file_name), &data)
            .await
            .map_err(|err| ApiError::General(format!("Failed to store upload: {err}")))?;

        info!(file_name = %file_name, bytes = data.len(), "Stored upload");

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "url": format!("/uploads/{file_name}"),
            })),
        )
            .into_response());
    }

    Err(ApiError::BadRequest("No file was provided.".into()))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}

fn allowed_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
