use crate::errors::ApiError;
use crate::metrics_defs::AUTH_FAILURES;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shared::counter;

pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = credentials(request.headers());
    match presented {
        Some((username, password))
            if username == state.auth.username && password == state.auth.password =>
        {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = request.uri().path(), "basic auth rejected");
            counter!(AUTH_FAILURES).increment(1);
            ApiError::Unauthorized.into_response()
        }
    }
}

fn credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
