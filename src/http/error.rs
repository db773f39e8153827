//! Mapping of [`AppError`] onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::AppError;

/// Status code reported for `err`.
#[must_use]
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) | AppError::NotFound(_) | AppError::Conflict(_) => {
            StatusCode::BAD_REQUEST
        }
        AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
        AppError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Launch(_)
        | AppError::Stop(_)
        | AppError::NoTarget(_)
        | AppError::Inspect(_)
        | AppError::AddressNotFound(_)
        | AppError::Git(_)
        | AppError::Store(_)
        | AppError::Io(_)
        | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), %message, "request failed");
        } else {
            warn!(status = status.as_u16(), %message, "request rejected");
        }
        (status, message).into_response()
    }
}
