use std::sync::Arc;

use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::config::SESSION_MAX_AGE_DAYS;
use crate::error::{AppError, Result};
use crate::models::session::Session;
use crate::session::codec::SessionCodec;

/// Attributes of the session cookie.
#[derive(Clone, Debug)]
pub struct SessionCookieConfig {
    pub name: String,
    pub max_age_days: i64,
    /// Adds `Secure`; always on in production.
    pub secure: bool,
}

/// Loads the session from the request cookie and writes it back.
///
/// Cheap to clone; the derived key is shared.
#[derive(Clone)]
pub struct SessionStore {
    codec: Arc<SessionCodec>,
    cookie: SessionCookieConfig,
}

impl SessionStore {
    /// Creates a new `SessionStore`.
    ///
    /// # Arguments
    ///
    /// * `secret` - The secret the sealing key is derived from.
    /// * `cookie` - Name and attributes of the session cookie.
    ///
    /// # Returns
    ///
    /// A `Result` containing the store, or an error when `max_age_days` is
    /// outside [`SESSION_MAX_AGE_DAYS`].
    pub fn new(secret: &str, cookie: SessionCookieConfig) -> Result<Self> {
        if !SESSION_MAX_AGE_DAYS.contains(&cookie.max_age_days) {
            return Err(AppError::Internal(format!(
                "session cookie max age of {} days is out of range",
                cookie.max_age_days
            )));
        }

        let codec = SessionCodec::new(secret, &cookie.name)?;
        Ok(Self {
            codec: Arc::new(codec),
            cookie,
        })
    }

    /// Returns the session carried by the request, or a fresh one.
    pub fn load(&self, cookies: &Cookies) -> Result<Session> {
        let cookie = cookies.get(&self.cookie.name);
        self.decode(cookie.as_ref().map(|c| c.value()))
    }

    /// Same as [`load`](Self::load), from the raw cookie value.
    pub fn decode(&self, value: Option<&str>) -> Result<Session> {
        let Some(value) = value else {
            return Ok(Session::new());
        };

        match self.codec.decode(value) {
            Ok(Some(record)) => Ok(Session::from_record(record)),
            Ok(None) => {
                tracing::debug!("🍪 Discarding unusable session cookie, starting fresh");
                Ok(Session::new())
            }
            Err(e) => Err(AppError::SessionTransport(e.to_string())),
        }
    }

    /// Writes the session cookie when the session changed during this request.
    ///
    /// Calling it again without further changes does nothing.
    pub fn save(&self, session: &mut Session, cookies: &Cookies) -> Result<()> {
        if let Some(cookie) = self.encode_cookie(session)? {
            cookies.add(cookie);
        }
        Ok(())
    }

    /// The `Set-Cookie` to emit for `session`, if any.
    pub fn encode_cookie(&self, session: &mut Session) -> Result<Option<Cookie<'static>>> {
        if !session.needs_save() {
            return Ok(None);
        }

        let record = session.to_record();
        let value = self
            .codec
            .encode(&record)
            .map_err(|e| AppError::SessionTransport(e.to_string()))?;
        session.mark_saved();

        tracing::debug!("🍪 Session {} saved", record.id);
        Ok(Some(self.build_cookie(value)))
    }

    fn build_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.cookie.name.clone(), value);

        cookie.set_http_only(true);
        if self.cookie.secure {
            cookie.set_secure(true);
        }

        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(Duration::days(self.cookie.max_age_days));
        cookie.set_path("/");

        cookie
    }
}
