use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::middleware_layer::csrf::OriginPolicy;
use crate::render::Renderer;
use crate::repositories::user::{MemoryUserRepository, PgUserRepository, UserStore};
use crate::services::identity::{DevIdentityProvider, IdentityProvider, UnconfiguredIdentityProvider};
use crate::session::store::{SessionCookieConfig, SessionStore};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Reads and writes the session cookie.
    pub sessions: SessionStore,
    /// Which origins may send state-changing requests.
    pub origin_policy: Arc<OriginPolicy>,
    /// Writes HTML and JSON responses.
    pub render: Renderer,
    /// The user records behind the CRUD routes.
    pub users: UserStore,
    /// Completes the login handshake.
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Connects to PostgreSQL when `DATABASE_URL` is set and keeps users in
    /// memory otherwise.
    pub async fn new(config: &Config) -> Result<Self> {
        let production = config.deploy_env.is_production();

        let sessions = SessionStore::new(
            &config.session_secret,
            SessionCookieConfig {
                name: config.session_cookie_name.clone(),
                max_age_days: config.session_max_age_days,
                secure: production,
            },
        )?;
        tracing::info!("✅ Session store initialized (cookie: {})", config.session_cookie_name);

        let origin_policy = OriginPolicy::from_config(config)?;
        match origin_policy.trusted() {
            Some(trusted) => tracing::info!("✅ Trusted origin: {:?}", trusted.header_value()),
            None => tracing::warn!("⚠️ Origin checks disabled outside production"),
        }

        let users = match &config.database_url {
            Some(url) => {
                let pool = crate::db::create_pool(url)?;
                crate::db::ensure_schema(&pool).await?;
                tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");
                UserStore::Postgres(PgUserRepository::new(pool))
            }
            None => {
                tracing::info!("✅ Using in-memory user storage");
                UserStore::Memory(MemoryUserRepository::new())
            }
        };

        let identity: Arc<dyn IdentityProvider> = if production {
            tracing::warn!("⚠️ No identity provider configured, logins will fail");
            Arc::new(UnconfiguredIdentityProvider)
        } else {
            Arc::new(DevIdentityProvider)
        };

        Ok(AppState {
            config: Arc::new(config.clone()),
            sessions,
            origin_policy: Arc::new(origin_policy),
            render: Renderer::new(production),
            users,
            identity,
        })
    }

    /// Replaces the identity provider.
    pub fn with_identity_provider(mut self, provider: impl IdentityProvider) -> Self {
        self.identity = Arc::new(provider);
        self
    }
}
