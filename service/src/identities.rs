use crate::errors::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use refdata::snapshot;

/// Returns the identity snapshot file as-is.
pub async fn get_identities(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = &state.reference_data.identity.snapshot_path;
    match snapshot::read_raw(path).await {
        Ok(contents) => Ok(([(CONTENT_TYPE, "application/json")], contents).into_response()),
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "failed to read identity snapshot");
            Err(ApiError::Processing)
        }
    }
}

/// Replaces the identity snapshot with the request body. The body is not validated.
pub async fn post_identities(
    State(state): State<AppState>,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let contents = axum::body::to_bytes(body, state.reference_data.max_chunk_bytes)
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "unable to read identities body");
            ApiError::UnreadableBody
        })?;

    let path = &state.reference_data.identity.snapshot_path;
    snapshot::replace_file(path, &contents).await.map_err(|error| {
        tracing::error!(path = %path.display(), error = %error, "failed to write identity snapshot");
        ApiError::Processing
    })?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "identity snapshot replaced");
    Ok(StatusCode::OK)
}
