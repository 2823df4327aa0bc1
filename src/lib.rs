//! Session, cross-origin and login middleware for an axum web application,
//! together with the small user-management app they protect.

pub mod config;
pub mod db;
pub mod error;
pub mod negotiate;
pub mod render;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod aes;
}

pub mod models {
    pub mod session;
    pub mod user;
}

pub mod session {
    pub mod codec;
    pub mod flash;
    pub mod store;
}

pub mod repositories {
    pub mod user;
}

pub mod services {
    pub mod identity;
}

pub mod handlers {
    pub mod auth;
    pub mod home;
    pub mod users;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod cors;
    pub mod csrf;
    pub mod errors;
    pub mod https;
    pub mod session;
}

pub use config::Config;
pub use state::AppState;

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{HeaderMap, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use zeroize::Zeroizing;

    use crate::config::{Config, Environment, DEV_SESSION_SECRET};
    use crate::state::AppState;

    pub fn dev_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            deploy_env: Environment::Development,
            session_secret: Zeroizing::new(DEV_SESSION_SECRET.to_string()),
            site_url: None,
            enforce_auth: false,
            login_lifetime: Duration::from_secs(7200),
            session_cookie_name: "gatehouse_session".to_string(),
            session_max_age_days: 30,
            cors_max_age: Duration::from_secs(86400),
            database_url: None,
        }
    }

    pub async fn state_for(config: &Config) -> AppState {
        AppState::new(config).await.unwrap()
    }

    pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }
}
