use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use refdata::StoreError;

/// Errors returned to HTTP callers. The message is the whole response body;
/// details stay in the logs.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ApiError {
    #[error("Authorization failed")]
    Unauthorized,
    #[error("Missing or invalid position query string parameter")]
    InvalidPosition,
    #[error("Missing or invalid type query string parameter")]
    InvalidType,
    #[error("Unable to read body")]
    UnreadableBody,
    #[error("Processing Error")]
    Processing,
    #[error("Error in input parameters or processing; please contact your service administrator")]
    Report,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("instanceEnvironment query parameter is missing")]
    MissingEnvironment,
    #[error("instanceEnvironment {0} is not mapped to a schema")]
    UnknownEnvironment(String),
    #[error("query failed: {0}")]
    Store(#[from] StoreError),
}

impl From<ReportError> for ApiError {
    fn from(_: ReportError) -> Self {
        ApiError::Report
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
