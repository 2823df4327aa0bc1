use std::any::Any;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::{AppError, ErrorReport},
    negotiate,
    state::AppState,
};

/// A middleware that re-renders handler and middleware errors in the
/// representation the client negotiated.
///
/// `AppError` responses carry an [`ErrorReport`]; anything else passes
/// through untouched.
pub async fn render_errors(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let content_type = negotiate::content_type(req.headers());
    let response = next.run(req).await;

    match response.extensions().get::<ErrorReport>() {
        Some(report) => state.render.error(content_type, report),
        None => response,
    }
}

/// Turns a caught panic into an internal error, for `CatchPanicLayer`.
///
/// The result carries an [`ErrorReport`], so [`render_errors`] renders it
/// like any other failure.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("handler panicked: {}", message)).into_response()
}
