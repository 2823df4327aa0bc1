use axum::{extract::State, response::Response};

use crate::{
    error::AppError,
    middleware_layer::session::SessionHandle,
    render::{escape, Page},
    state::AppState,
};

/// Handles `GET /`.
pub async fn index(State(state): State<AppState>, session: SessionHandle) -> Response {
    let greeting = match session.data().await.user_name {
        Some(name) => format!("<p>Signed in as {}.</p>", escape(&name)),
        None => "<p><a href=\"/auth\">Log in</a> to manage users.</p>".to_string(),
    };

    let body = format!("<h1>Welcome</h1>\n{}", greeting);
    state.render.html(&session, Page::new("Home", body)).await
}

/// Fallback for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound("404 Not Found".to_string())
}
