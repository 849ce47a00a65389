use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::api::handler_utils::{internal_error, map_session_error, parse_slot_index};
use crate::api::server::AppState;
use crate::media::export::{build_export, now_unix_ms};

/// Streams the result of a Success slot as a download. The index addresses
/// the active mode's slots, so single modes only answer for index 0.
pub async fn export_slot_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> Response {
    let index = match parse_slot_index(index.as_str()) {
        Ok(index) => index,
        Err(response) => return response.into_response(),
    };
    let (target, result) = match state.session.export_source(index) {
        Ok(source) => source,
        Err(error) => return map_session_error(error).into_response(),
    };
    let artifact = match build_export(target, &result, now_unix_ms()) {
        Ok(artifact) => artifact,
        Err(error) => return internal_error(format!("export build failed: {error}")).into_response(),
    };

    info!(index, file_name = %artifact.file_name, bytes = artifact.bytes.len(), "export served");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.media_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.bytes,
    )
        .into_response()
}
