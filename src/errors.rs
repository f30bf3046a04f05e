use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::validation::ValidationErrors;

/// Client-facing message for rejected payloads (Hebrew, the form's locale).
pub const MSG_INVALID_DATA: &str = "נתונים לא תקינים";
/// Client-facing message for rate-limited clients. The quoted figure matches
/// the default window; keep it in step with `RATE_LIMIT_WINDOW_SECS` when
/// retuning.
pub const MSG_RATE_LIMITED: &str = "יותר מדי בקשות. נסה שוב בעוד 15 דקות.";
/// Client-facing message for unexpected failures.
pub const MSG_INTERNAL: &str = "שגיאה פנימית בשרת";

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// The submission failed schema validation, or the body was not valid JSON.
    Validation(ValidationErrors),
    /// The client exhausted its request window.
    RateLimited,
    /// Internal server error.
    #[allow(dead_code)]
    Internal(String),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => write!(f, "Validation failed: {}", errors),
            AppError::RateLimited => write!(f, "Rate limit exceeded"),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each variant to its status code and localized JSON body.
    /// Field-level validation detail stays in the logs; clients only see the
    /// generic message.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(errors) => {
                tracing::warn!("Validation failed: {}", errors);
                (StatusCode::BAD_REQUEST, MSG_INVALID_DATA)
            }
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, MSG_RATE_LIMITED),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
