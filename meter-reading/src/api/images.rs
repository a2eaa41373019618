//! Stored image artifacts

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::error::ApiResult;
use crate::AppState;

/// GET /images/:artifact
///
/// Serves the image a measurement's `image_url` points at.
pub async fn get_image(
    State(state): State<AppState>,
    Path(artifact): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (bytes, mime_type) = state.codec.open(&artifact).await?;
    Ok(([(header::CONTENT_TYPE, mime_type)], bytes))
}
