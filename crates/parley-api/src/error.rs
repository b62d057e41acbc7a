use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use parley_core::CoreError;

/// Error returned by every handler. Serialized as
/// `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("missing or invalid bearer token")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => match err {
                CoreError::InvalidParticipants(_) | CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CoreError::Forbidden(_) | CoreError::NoAccess(_) => StatusCode::FORBIDDEN,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Core(err) => match err {
                CoreError::InvalidParticipants(_) => "INVALID_PARTICIPANTS",
                CoreError::InvalidInput(_) => "INVALID_INPUT",
                CoreError::Forbidden(_) => "FORBIDDEN",
                CoreError::NoAccess(_) => "NO_ACCESS",
                CoreError::NotFound(_) => "NOT_FOUND",
                CoreError::Conflict(_) => "CONFLICT",
                CoreError::Unauthorized => "UNAUTHORIZED",
                CoreError::Storage(_) => "INTERNAL_ERROR",
            },
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the log
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Internal server error");
            "internal server error".to_string()
        } else {
            warn!(code = self.error_code(), "Request rejected: {}", self);
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// Extractor rejections become INVALID_INPUT so every failure shares the error body.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Core(CoreError::InvalidInput(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Core(CoreError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Core(CoreError::InvalidInput(rejection.body_text()))
    }
}

/// Rejection for thread-creation bodies. An unreadable participant list,
/// including ids that are not UUIDs, is an invalid participant set.
#[derive(Debug)]
pub struct ParticipantsRejection(ApiError);

impl From<JsonRejection> for ParticipantsRejection {
    fn from(rejection: JsonRejection) -> Self {
        Self(ApiError::Core(CoreError::InvalidParticipants(rejection.body_text())))
    }
}

impl IntoResponse for ParticipantsRejection {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}
