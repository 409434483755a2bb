//! Synthesized-audio fetch endpoint.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// `GET /audio/{blobId}` — serves a stored audio payload with its content
/// type. The telephony provider fetches these once for playback; evicted or
/// unknown ids are a plain 404.
pub async fn get_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(blob_id): Path<String>,
) -> Response {
    match state.blobs.get(&blob_id) {
        Some(blob) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, blob.content_type)],
            blob.payload,
        )
            .into_response(),
        None => {
            tracing::debug!(blob_id = %blob_id, "audio blob not found (evicted or never stored)");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
