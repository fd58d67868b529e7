//! Conversion of errors into JSON error responses.

use crate::error::{ApiErrorBody, ErrorKind, RelayError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::any::Any;
use tracing::{debug, error};

/// Build a response carrying `{"kind": ..., "description": ...}`.
pub fn error_response(status: StatusCode, body: ApiErrorBody) -> Response {
    (status, Json(body)).into_response()
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = self.to_body();
        if body.kind == ErrorKind::InternalError {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }
        let status = StatusCode::from_u16(body.kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, body)
    }
}

/// Response for a handler that panicked.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiErrorBody {
            kind: ErrorKind::InternalError,
            description: "internal error".to_string(),
        },
    )
}
