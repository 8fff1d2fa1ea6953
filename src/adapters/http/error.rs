use crate::error::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Pipeline errors as HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::ObjectNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::InvalidPathSegment(_) => StatusCode::BAD_REQUEST,
            PipelineError::NoSegmentSet(_) | PipelineError::UnknownNamespace(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Keys and backend details stay in the logs.
        let body = match &self.0 {
            PipelineError::ObjectNotFound(_) => json!({ "error": "File not found" }),
            err => json!({ "error": err.to_string(), "kind": err.kind() }),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}
