use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Stored names are always `<uuid>.<ext>`, which also rules out path traversal.
pub static STORED_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.(jpg|png|webp)$")
        .expect("valid file name regex")
});

pub fn uploads_router() -> Router {
    Router::new().route("/uploads/:file_name", get(serve_upload))
}

pub async fn serve_upload(
    Path(file_name): Path<String>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound(format!("No image named {file_name}"));

    if !STORED_FILE_NAME.is_match(&file_name) {
        return Err(not_found());
    }

    let path = state.config.upload_dir.join(&file_name);
    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found())?;

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let body = Body::from_stream(ReaderStream::new(file));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok((headers, body).into_response())
}
