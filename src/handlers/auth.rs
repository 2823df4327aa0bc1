use axum::{
    extract::{Query, State},
    response::Response,
};

use crate::{
    error::Result,
    middleware_layer::session::SessionHandle,
    services::identity::CallbackParams,
    state::AppState,
};

/// Handles `GET /auth`: starts the provider login.
pub async fn begin(State(state): State<AppState>) -> Response {
    state.render.redirect(&state.identity.authorize_url())
}

/// Handles `GET /auth/callback`.
///
/// The only path that turns an anonymous session into a real login. A failed
/// provider result becomes a 401 in the negotiated representation.
pub async fn callback(
    State(state): State<AppState>,
    session: SessionHandle,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let identity = state.identity.complete(&params).await?;

    tracing::info!("✅ User logged in: {}", identity.email);
    session.set_identity(identity.name, identity.email).await;

    Ok(state.render.redirect("/"))
}

/// Handles `GET /logout`.
pub async fn logout(State(state): State<AppState>, session: SessionHandle) -> Response {
    session.clear().await;
    tracing::info!("👋 Session cleared");
    state.render.redirect("/")
}
