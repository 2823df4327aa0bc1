use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    models::session::{Session, SessionData},
    state::AppState,
};

/// The current request's session.
///
/// Created by [`load_session`] for one request and dropped with it; clones
/// share the same session so the middleware sees what handlers changed.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }

    /// A copy of the current values.
    pub async fn data(&self) -> SessionData {
        self.lock().await.data().clone()
    }

    pub async fn set_identity(&self, name: String, email: String) {
        self.lock().await.set_identity(name, email, Utc::now());
    }

    pub async fn clear(&self) {
        self.lock().await.clear();
    }

    pub async fn add_flash(&self, category: &str, message: &str) {
        self.lock().await.add_flash(category, message);
    }

    pub async fn pop_flash(&self) -> BTreeMap<String, Vec<String>> {
        self.lock().await.pop_flash()
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session middleware is not installed".to_string()))
    }
}

/// A middleware that attaches the session to the request and saves it once
/// the rest of the chain has produced a response, whatever that response is.
///
/// A session that cannot be written back replaces the response with a 500.
pub async fn load_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = match state.sessions.load(&cookies) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    let handle = SessionHandle::new(session);
    req.extensions_mut().insert(handle.clone());

    let response = next.run(req).await;

    let mut session = handle.lock().await;
    match state.sessions.save(&mut session, &cookies) {
        Ok(()) => response,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::codec::SessionCodec;
    use crate::test_support::{dev_config, send, state_for};
    use axum::http::{header, Request, StatusCode};

    #[tokio::test]
    async fn authentic_but_corrupt_cookie_is_a_server_error() {
        let config = dev_config();
        let codec = SessionCodec::new(&config.session_secret, &config.session_cookie_name).unwrap();
        let cookie = format!("{}={}", config.session_cookie_name, codec.seal_raw(b"\xff\xff"));

        let app = crate::routes::router(state_for(&config).await);
        let req = Request::builder()
            .uri("/")
            .header(header::COOKIE, cookie)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert!(body.contains("Session transport failure"));
    }

    #[tokio::test]
    async fn unsaveable_session_is_a_server_error() {
        use axum::{middleware::from_fn_with_state, routing::get, Router};
        use tower_cookies::CookieManagerLayer;

        let state = state_for(&dev_config()).await;
        let app = Router::new()
            .route(
                "/big",
                get(|session: SessionHandle| async move {
                    session.add_flash("info", &"x".repeat(5000)).await;
                    "stored"
                }),
            )
            .layer(from_fn_with_state(state.clone(), load_session))
            .layer(from_fn_with_state(
                state.clone(),
                crate::middleware_layer::errors::render_errors,
            ))
            .layer(CookieManagerLayer::new())
            .with_state(state);

        let req = Request::builder()
            .uri("/big")
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert!(body.contains("Session transport failure"));
        assert!(!body.contains("stored"));
    }

    #[tokio::test]
    async fn tampered_cookie_is_treated_as_absent() {
        let config = dev_config();
        let cookie = format!("{}=AAAAtampered", config.session_cookie_name);

        let app = crate::routes::router(state_for(&config).await);
        let req = Request::builder()
            .uri("/")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(header::SET_COOKIE).is_none());
    }
}
