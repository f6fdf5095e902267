use crate::errors::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use refdata::{ChunkPosition, DataKind};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct ReferenceDataParams {
    position: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// `POST /postReferenceData?position=...&type=...`
///
/// Stores one chunk of a `{"items":[...]}` document. The load triggered by
/// `last` or `reprocess` runs in the background; the response never waits for it.
pub async fn post_reference_data(
    State(state): State<AppState>,
    Query(params): Query<ReferenceDataParams>,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let position: ChunkPosition = params
        .position
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| {
            tracing::error!(position = ?params.position, "missing or invalid position parameter");
            ApiError::InvalidPosition
        })?;
    let kind: DataKind = params
        .kind
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| {
            tracing::error!(kind = ?params.kind, "missing or invalid type parameter");
            ApiError::InvalidType
        })?;

    let bytes = axum::body::to_bytes(body, state.reference_data.max_chunk_bytes)
        .await
        .map_err(|error| {
            tracing::error!(kind = kind.as_str(), position = position.as_str(), error = %error, "unable to read body");
            ApiError::UnreadableBody
        })?;

    match state.coordinator.accept(kind, position, &bytes).await {
        Ok(accepted) => {
            tracing::debug!(kind = kind.as_str(), position = position.as_str(), bytes = bytes.len(), ?accepted, "chunk accepted");
            Ok(StatusCode::OK)
        }
        Err(error) => {
            tracing::error!(kind = kind.as_str(), position = position.as_str(), error = %error, "chunk rejected");
            Err(ApiError::Processing)
        }
    }
}
