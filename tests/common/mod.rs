#![allow(dead_code)]

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use gatehouse::{
    config::{Config, Environment, DEV_SESSION_SECRET},
    routes,
    services::identity::DevIdentityProvider,
    AppState,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::Url;
use zeroize::Zeroizing;

pub const TRUSTED: &str = "https://trusted.example";
pub const COOKIE_NAME: &str = "gatehouse_session";

pub fn config(deploy_env: Environment) -> Config {
    let production = deploy_env.is_production();
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        deploy_env,
        session_secret: Zeroizing::new(if production {
            "a-much-longer-production-secret".to_string()
        } else {
            DEV_SESSION_SECRET.to_string()
        }),
        site_url: production.then(|| Url::parse(TRUSTED).unwrap()),
        enforce_auth: false,
        login_lifetime: Duration::from_secs(7200),
        session_cookie_name: COOKIE_NAME.to_string(),
        session_max_age_days: 30,
        cors_max_age: Duration::from_secs(86400),
        database_url: None,
    }
}

/// Production app whose identity provider trusts the callback query.
pub async fn production_app() -> Router {
    let state = AppState::new(&config(Environment::Production)).await.unwrap();
    routes::router(state.with_identity_provider(DevIdentityProvider))
}

pub async fn app(config: &Config) -> Router {
    routes::router(AppState::new(config).await.unwrap())
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION)
    }

    /// `name=value` of the session cookie this response set.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie()
            .map(|raw| raw.split(';').next().unwrap_or_default().trim().to_string())
    }

    /// The full `Set-Cookie` header for the session cookie.
    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> Reply {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Reply {
    let mut req = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    send(app, req.body(Body::empty()).unwrap()).await
}

pub async fn get_json(app: &Router, uri: &str, cookie: Option<&str>) -> Reply {
    let mut req = Request::builder()
        .uri(uri)
        .header(header::ACCEPT, "application/json");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    send(app, req.body(Body::empty()).unwrap()).await
}

/// Logs in through the callback and returns the session cookie.
pub async fn login(app: &Router) -> String {
    let reply = get(
        app,
        "/auth/callback?name=Joe+Example&email=joe%40example.com",
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/"));
    reply.session_cookie().expect("login sets the session cookie")
}
