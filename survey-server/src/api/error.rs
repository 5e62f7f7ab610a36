//! Mapping of store errors onto HTTP responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use survey_common::Error;
use tracing::{debug, error};

/// Error returned by every API handler; body is `{"error": "<message>"}`
#[derive(Debug)]
pub enum ApiError {
    /// Failure reported by the session store
    Store(Error),
    /// Request body refused before reaching a handler (bad JSON, wrong
    /// content type, body too large)
    Rejected { status: StatusCode, message: String },
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(Error::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            Self::Store(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(Error::Internal(_) | Error::Config(_) | Error::Io(_) | Error::Json(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Store(err) => {
                if !err.is_client_error() {
                    error!("Request failed: {}", err);
                }
                match err {
                    Error::InvalidArgument(msg) | Error::NotFound(msg) | Error::Internal(msg) => {
                        msg
                    }
                    other => other.to_string(),
                }
            }
            Self::Rejected { message, .. } => {
                debug!("Rejected request body: {}", message);
                message
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
