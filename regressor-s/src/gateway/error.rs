use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::ValidationError;
use thiserror::Error;
use tracing::{debug, error};

use crate::model::PredictError;
use crate::util::msg::ErrorResponse;

/// Every way a request can fail after it reached a handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("prediction failed: {0}")]
    Prediction(#[from] PredictError),
    #[error("prediction task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Prediction(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!("Request failed: {}", self);
            ErrorResponse::new("internal server error")
        } else {
            debug!("Request rejected: {}", self);
            ErrorResponse::new(self.to_string())
        };
        (status, Json(body)).into_response()
    }
}
