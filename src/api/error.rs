use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::DetectiveError;

/// Body of every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl DetectiveError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DetectiveError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DetectiveError::PersonNotFound(_) | DetectiveError::RelationshipNotFound(..) => {
                StatusCode::NOT_FOUND
            }
            DetectiveError::PersonAlreadyExists(_) => StatusCode::CONFLICT,
            DetectiveError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            DetectiveError::InvalidInput(_) => "invalid_argument",
            DetectiveError::PersonNotFound(_) => "person_not_found",
            DetectiveError::RelationshipNotFound(..) => "relationship_not_found",
            DetectiveError::PersonAlreadyExists(_) => "person_already_exists",
            DetectiveError::Cancelled => "cancelled",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for DetectiveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the log.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        ErrorResponse::new(self.error_type(), message).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        let cases = [
            (DetectiveError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (DetectiveError::PersonNotFound(id), StatusCode::NOT_FOUND),
            (DetectiveError::RelationshipNotFound(id, id), StatusCode::NOT_FOUND),
            (DetectiveError::PersonAlreadyExists(id), StatusCode::CONFLICT),
            (DetectiveError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (DetectiveError::StoreConsistency("edge".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DetectiveError::Database(rusqlite::Error::InvalidQuery), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
            assert_eq!(err.into_response().status(), status);
        }
    }
}
