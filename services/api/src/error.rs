//! Custom error types for the API service

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unauthorized access
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource missing or not visible to the caller
    #[error("{0}")]
    NotFound(String),

    /// Bad request with message
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error; the message is safe to show to clients
    #[error("{0}")]
    Internal(&'static str),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] refile_common::error::DatabaseError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            ApiError::Database(_) => "Database error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound("Not found".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let (status, body) = body_json(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Unauthorized"}));

        let (status, body) =
            body_json(ApiError::BadRequest("Missing required field: name".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: name");

        let (status, body) = body_json(ApiError::Internal("Failed to fetch presets")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch presets");
    }

    #[tokio::test]
    async fn test_database_error_is_not_leaked() {
        let error = ApiError::from(refile_common::error::DatabaseError::Configuration(
            "password=hunter2".to_string(),
        ));
        let (status, body) = body_json(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error");
    }
}
