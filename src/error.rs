use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde_json::json;
use tracing::error;

use crate::repository::RepositoryError;

#[derive(Debug)]
pub enum AppError {
    Storage(RepositoryError),
    NotFound,
    BadRequest(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Storage(err) => {
                error!(error = %err, "Storage request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Storage(err)
    }
}
