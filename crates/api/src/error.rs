//! Error responses.
//!
//! Every failure leaves the API as `{ "error": <code>, "message": <text> }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use campus_core::tuition::{ErrorClass, TuitionError};
use campus_shared::AppError;

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<TuitionError> for ApiError {
    fn from(err: TuitionError) -> Self {
        let message = match err.class() {
            // Details stay in the logs; the service already recorded them.
            ErrorClass::Internal => "An error occurred".to_string(),
            _ => err.to_string(),
        };
        Self {
            status: status_from(err.http_status_code()),
            code: err.error_code(),
            message,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let message = match err {
            AppError::Database(_) | AppError::Internal(_) => {
                error!(error = %err, "Request failed");
                "An error occurred".to_string()
            }
            _ => err.to_string(),
        };
        Self {
            status: status_from(err.status_code()),
            code: err.error_code(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}
