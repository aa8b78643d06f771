use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app_error::AppError;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log before the error collapses into a status response.
        tracing::error!(error = ?self, "Request failed");

        let status = match &self {
            AppError::InvalidSignature | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Detail only for input errors; storage and auth failures stay opaque.
        let body = match &self {
            AppError::InvalidInput(msg) => {
                serde_json::json!({ "code": self.code(), "message": msg })
            }
            _ => serde_json::json!({ "code": self.code() }),
        };

        (status, Json(body)).into_response()
    }
}
