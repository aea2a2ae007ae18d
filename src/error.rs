use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::feed::FeedError;
use crate::rate_limit::LimitError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    RateLimited { message: String, retry_after: u64 },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<LimitError> for ApiError {
    fn from(e: LimitError) -> Self {
        match e {
            LimitError::UnknownPolicy(_) => ApiError::NotFound(e.to_string()),
            LimitError::InvalidLimit { .. } => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ApiError::RateLimited { retry_after, .. } => {
                let body = json!({ "error": message, "retryAfter": retry_after });
                let mut res = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                res.headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after));
                res
            }
            ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message })))
                    .into_response()
            }
        }
    }
}
