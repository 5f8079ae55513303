use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, inverted dates, overlapping requests, invalid transitions.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("You don't have enough available holidays: requested {requested}, available {available}.")]
    InsufficientBalance { requested: i32, available: i32 },

    #[error("You've exceeded your allowed {leave_type} days: requested {requested}, used {used} of {max}.")]
    QuotaExceeded {
        leave_type: String,
        requested: i32,
        used: i32,
        max: i32,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A third-party dependency failed. `imported` counts records stored before the failure.
    #[error("{message}")]
    External { message: String, imported: u64 },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InsufficientBalance { .. } | AppError::QuotaExceeded { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::External { .. } => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                HttpResponse::build(status).json(json!({ "message": "Internal Server Error" }))
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "Internal error");
                HttpResponse::build(status).json(json!({ "message": "Internal Server Error" }))
            }
            AppError::External { message, imported } => {
                tracing::warn!(%message, imported, "External dependency failed");
                HttpResponse::build(status).json(json!({
                    "message": message,
                    "imported": imported,
                }))
            }
            other => HttpResponse::build(status).json(json!({ "message": other.to_string() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_distinct_statuses() {
        assert_eq!(
            AppError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::forbidden("no").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("Leave request").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InsufficientBalance {
                requested: 3,
                available: 1
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::External {
                message: "down".into(),
                imported: 2
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn insufficient_balance_message_names_the_shortfall() {
        let msg = AppError::InsufficientBalance {
            requested: 3,
            available: 1,
        }
        .to_string();
        assert!(msg.contains("enough available holidays"));
        assert!(msg.contains("requested 3"));
        assert!(msg.contains("available 1"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("secret connection string"));
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
