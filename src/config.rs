use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;
use zeroize::Zeroizing;

/// Secret used outside production when `SESSION_SECRET` is unset.
pub const DEV_SESSION_SECRET: &str = "not-so-super-secret";

/// Accepted `SESSION_MAX_AGE_DAYS`.
pub const SESSION_MAX_AGE_DAYS: RangeInclusive<i64> = 1..=3650;
/// Accepted `LOGIN_LIFETIME_SECS`: one minute to one year.
pub const LOGIN_LIFETIME_SECS: RangeInclusive<u64> = 60..=365 * 24 * 60 * 60;
/// Accepted `CORS_MAX_AGE_SECS`.
pub const CORS_MAX_AGE_SECS: RangeInclusive<u64> = 0..=7 * 24 * 60 * 60;

/// Where the process is deployed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Anything that is not explicitly development or test counts as production.
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "development" => Environment::Development,
            "test" => Environment::Test,
            _ => Environment::Production,
        })
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub server_addr: SocketAddr,
    /// The deployment environment.
    pub deploy_env: Environment,
    /// The secret the session cookie key is derived from.
    pub session_secret: Zeroizing<String>,
    /// The public origin of the site; the only trusted origin in production.
    pub site_url: Option<Url>,
    /// Redirect anonymous users to login even outside production.
    pub enforce_auth: bool,
    /// How long a login stays valid without activity.
    pub login_lifetime: Duration,
    /// The name of the session cookie.
    pub session_cookie_name: String,
    /// `Max-Age` of the session cookie in days.
    pub session_max_age_days: i64,
    /// `Access-Control-Max-Age` for preflight responses.
    pub cors_max_age: Duration,
    /// The URL of the PostgreSQL database; in-memory storage when absent.
    pub database_url: Option<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or an error when production is missing
    /// `SESSION_SECRET` or `SITE_URL`, or a numeric setting is malformed or
    /// out of range.
    pub fn from_env() -> Result<Self> {
        let Ok(deploy_env) = env::var("DEPLOY_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse::<Environment>();

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => Zeroizing::new(secret),
            _ if deploy_env.is_production() => {
                anyhow::bail!("SESSION_SECRET must be set in production")
            }
            _ => Zeroizing::new(DEV_SESSION_SECRET.to_string()),
        };

        let site_url = match env::var("SITE_URL") {
            Ok(raw) if !raw.is_empty() => {
                Some(Url::parse(&raw).context("SITE_URL must be an absolute URL")?)
            }
            _ if deploy_env.is_production() => {
                anyhow::bail!("SITE_URL must be set in production")
            }
            _ => None,
        };

        Ok(Self {
            server_addr: env::var("SERVER_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid SERVER_ADDR")?,
            deploy_env,
            session_secret,
            site_url,
            enforce_auth: env_flag("ENFORCE_AUTH")?,
            login_lifetime: Duration::from_secs(env_bounded(
                "LOGIN_LIFETIME_SECS",
                7200,
                LOGIN_LIFETIME_SECS,
            )?),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "gatehouse_session".to_string()),
            session_max_age_days: env_bounded("SESSION_MAX_AGE_DAYS", 30, SESSION_MAX_AGE_DAYS)?,
            cors_max_age: Duration::from_secs(env_bounded(
                "CORS_MAX_AGE_SECS",
                86400,
                CORS_MAX_AGE_SECS,
            )?),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        })
    }

    /// Whether anonymous visitors to gated routes get sent to login.
    pub fn auth_enforced(&self) -> bool {
        self.deploy_env.is_production() || self.enforce_auth
    }
}

fn env_bounded<T>(name: &str, default: T, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_bounded(name, env::var(name).ok().as_deref(), default, range)
}

/// Parses a numeric setting, falling back to `default` when unset and
/// rejecting values outside `range`.
fn parse_bounded<T>(name: &str, raw: Option<&str>, default: T, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => default,
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Invalid {}", name))?,
    };

    if !range.contains(&value) {
        anyhow::bail!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(value)
}

fn env_flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Err(_) => Ok(false),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" => Ok(false),
            "1" | "true" | "yes" => Ok(true),
            other => anyhow::bail!("{} must be a boolean, got {:?}", name, other),
        },
    }
}
