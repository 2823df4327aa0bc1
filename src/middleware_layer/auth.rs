use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::{
    middleware_layer::session::SessionHandle,
    models::session::Session,
    state::AppState,
};

/// Where anonymous visitors to gated routes are sent.
pub const LOGIN_PATH: &str = "/auth";

/// Identity installed for anonymous visitors when auth is not enforced.
pub const PLACEHOLDER_NAME: &str = "Joe Schmoe";
pub const PLACEHOLDER_EMAIL: &str = "joe.schmoe@example.com";

/// Login state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginState {
    Anonymous,
    Authenticated,
    /// Had an identity whose window lapsed; all values were cleared.
    Expired,
}

/// The signed-in user, available to gated handlers as an extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub name: String,
    pub email: String,
}

/// Applies the sliding expiry window to `session` and classifies it.
///
/// A stale `last_used` wipes every session value, not only the identity. A
/// fresh one is moved to `now`.
pub fn evaluate(session: &mut Session, now: DateTime<Utc>, lifetime: Duration) -> LoginState {
    if let Some(last_used) = session.data().last_used {
        let idle = now.timestamp().saturating_sub(last_used);
        let window = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        if idle > window {
            session.clear();
            return LoginState::Expired;
        }
        session.touch(now);
    }

    if session.data().user_email.is_some() {
        LoginState::Authenticated
    } else {
        LoginState::Anonymous
    }
}

/// A middleware that only lets logged-in sessions through.
///
/// Anonymous and expired sessions are redirected to [`LOGIN_PATH`] when auth
/// is enforced; otherwise they are given the placeholder identity.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `session` - The request's session.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response with a [`CurrentUser`] extension installed, or a
/// 303 redirect to login.
pub async fn require_login(
    State(state): State<AppState>,
    session: SessionHandle,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking login...");

    let current = {
        let mut session = session.lock().await;
        let now = Utc::now();

        match evaluate(&mut session, now, state.config.login_lifetime) {
            LoginState::Authenticated => {}
            login_state => {
                if login_state == LoginState::Expired {
                    tracing::info!("⌛ Login expired, session cleared");
                }

                if state.config.auth_enforced() {
                    tracing::debug!("❌ Not logged in, redirecting to {}", LOGIN_PATH);
                    drop(session);
                    return state.render.redirect(LOGIN_PATH);
                }

                tracing::debug!("🧪 Auth not enforced, installing placeholder identity");
                session.set_identity(PLACEHOLDER_NAME.to_string(), PLACEHOLDER_EMAIL.to_string(), now);
            }
        }

        let data = session.data();
        CurrentUser {
            name: data.user_name.clone().unwrap_or_default(),
            email: data.user_email.clone().unwrap_or_default(),
        }
    };

    tracing::debug!("✅ User authenticated: {}", current.email);
    request.extensions_mut().insert(current);

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as Span;

    const TWO_HOURS: Duration = Duration::from_secs(2 * 60 * 60);

    fn logged_in(last_used: DateTime<Utc>) -> Session {
        let mut session = Session::new();
        session.set_identity("Joe".into(), "joe@example.com".into(), last_used);
        session.add_flash("info", "pending");
        session
    }

    #[test]
    fn stale_login_clears_everything() {
        let now = Utc::now();
        let mut session = logged_in(now - Span::hours(3));

        assert_eq!(evaluate(&mut session, now, TWO_HOURS), LoginState::Expired);
        assert!(session.data().user_email.is_none());
        assert!(session.data().user_name.is_none());
        assert!(session.data().last_used.is_none());
        assert!(session.data().flash.is_empty());
    }

    #[test]
    fn fresh_login_slides_forward() {
        let now = Utc::now();
        let mut session = logged_in(now - Span::minutes(30));

        assert_eq!(evaluate(&mut session, now, TWO_HOURS), LoginState::Authenticated);
        assert_eq!(session.data().user_email.as_deref(), Some("joe@example.com"));
        assert_eq!(session.data().last_used, Some(now.timestamp()));
    }

    #[test]
    fn empty_session_is_anonymous_and_untouched() {
        let mut session = Session::new();
        assert_eq!(evaluate(&mut session, Utc::now(), TWO_HOURS), LoginState::Anonymous);
        assert!(!session.needs_save());
    }

    #[test]
    fn huge_lifetime_never_expires() {
        let now = Utc::now();
        let mut session = logged_in(now - Span::days(365));
        assert_eq!(
            evaluate(&mut session, now, Duration::from_secs(u64::MAX)),
            LoginState::Authenticated
        );
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = Utc::now();
        let mut session = logged_in(now - Span::hours(2));
        assert_eq!(evaluate(&mut session, now, TWO_HOURS), LoginState::Authenticated);
    }
}
