//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.
//! Driver details are logged, never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::DbError;
use crate::models::ValidationError;
use crate::startup::ConnectionState;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Unique constraint violated (400)
    Conflict { message: String },

    /// Body could not be parsed (400)
    BadRequest { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Data layer not ready yet, or gave up (500)
    Unavailable { state: ConnectionState },

    /// Database error (500, logged)
    Database(DbError),
}

impl ApiError {
    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "User",
            id: id.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "field": e.field(),
                    "message": e.to_string()
                }),
            ),
            Self::Conflict { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "conflict",
                    "message": message
                }),
            ),
            Self::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "bad_request",
                    "message": message
                }),
            ),
            Self::NotFound { resource, id } => {
                tracing::debug!(%resource, %id, "not found");
                (
                    StatusCode::NOT_FOUND,
                    json!({
                        "error": "not_found",
                        "message": format!("{} not found", resource)
                    }),
                )
            }
            Self::Unavailable { state } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "database_unavailable",
                    "message": format!("database is not ready ({})", state)
                }),
            ),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict { message },
            _ => Self::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Missing { field: "name" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "name is required");
        assert_eq!(body["field"], "name");
    }

    #[tokio::test]
    async fn conflict_is_400() {
        let err: ApiError = DbError::Conflict("email already in use".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "conflict");
    }

    #[tokio::test]
    async fn not_found_is_404_with_user_message() {
        let err: ApiError = DbError::user_not_found(9).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "User not found");
    }

    #[tokio::test]
    async fn connection_error_is_500_without_details() {
        let err: ApiError = DbError::connection("Access denied for user 'root'").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "an internal error occurred");
        assert!(!body.to_string().contains("root"));
    }

    #[tokio::test]
    async fn unavailable_is_500() {
        let err = ApiError::Unavailable {
            state: ConnectionState::Syncing,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["message"],
            "database is not ready (syncing)"
        );
    }
}
