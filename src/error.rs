use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Message shown instead of internal details when running in production.
pub const GENERIC_MESSAGE: &str = "internal error, see logs for details";

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The session codec failed on a cookie that authenticated correctly.
    /// Signals a server misconfiguration, not a bad client.
    #[error("Session transport failure: {0}")]
    SessionTransport(String),

    /// A cross-origin policy rejection.
    #[error("Cross-origin request rejected: {0}")]
    Forbidden(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// A resource not found error.
    #[error("{0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

/// What an error looks like once it leaves a handler.
///
/// Attached to the response extensions so the error-rendering middleware can
/// re-render it in the negotiated representation.
#[derive(Clone, Debug)]
pub struct ErrorReport {
    pub status: StatusCode,
    /// Safe to show to any client.
    pub public: String,
    /// Full detail, shown only outside production.
    pub detail: String,
}

impl AppError {
    /// Maps the error to a status and client-facing messages, logging it at
    /// the level its category warrants.
    pub fn report(&self) -> ErrorReport {
        let detail = self.to_string();
        let (status, public) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_string())
            }

            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_string())
            }

            AppError::SessionTransport(msg) => {
                tracing::error!("Session transport failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_string())
            }

            AppError::Forbidden(msg) => {
                tracing::warn!("Cross-origin request rejected: {}", msg);
                (StatusCode::FORBIDDEN, detail.clone())
            }

            AppError::Unauthorized(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }

            AppError::NotFound(msg) => {
                tracing::debug!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }

            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_string())
            }
        };

        ErrorReport { status, public, detail }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = self.report();

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": report.public
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        let mut response = (
            report.status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
        response.extensions_mut().insert(report);
        response
    }
}
