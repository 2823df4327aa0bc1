use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use url::{Origin, Url};

use crate::{config::Config, error::AppError, state::AppState};

/// The single origin honored in production.
#[derive(Clone, Debug)]
pub struct TrustedOrigin {
    origin: Origin,
    header: HeaderValue,
}

impl TrustedOrigin {
    pub fn parse(url: &Url) -> anyhow::Result<Self> {
        let origin = url.origin();
        if !origin.is_tuple() {
            anyhow::bail!("{} has no scheme/host/port origin", url);
        }
        let header = HeaderValue::from_str(&origin.ascii_serialization())?;
        Ok(Self { origin, header })
    }

    /// The origin as it appears in an `Origin` header.
    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }

    /// `path_and_query` on this origin's host and port, over HTTPS.
    pub fn https_location(&self, path_and_query: &str) -> String {
        let origin = self.origin.ascii_serialization();
        let authority = origin
            .split_once("://")
            .map_or(origin.as_str(), |(_, authority)| authority);
        format!("https://{}{}", authority, path_and_query)
    }
}

/// Which origins may issue state-changing requests.
///
/// The default is the permissive non-production policy that trusts every
/// origin; it exists for local development and tests and is never built when
/// running in production.
#[derive(Clone, Debug, Default)]
pub struct OriginPolicy {
    trusted: Option<TrustedOrigin>,
}

/// Why a request was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OriginRejection {
    #[error("neither Origin nor Referer header present")]
    MissingOrigin,

    #[error("malformed {header} header")]
    Malformed { header: &'static str },

    #[error("origin {0} is not trusted")]
    Untrusted(String),
}

impl OriginPolicy {
    /// Trusts every origin.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Trusts exactly `site_url`'s origin.
    pub fn production(site_url: &Url) -> anyhow::Result<Self> {
        Ok(Self {
            trusted: Some(TrustedOrigin::parse(site_url)?),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        if !config.deploy_env.is_production() {
            return Ok(Self::permissive());
        }
        let site_url = config
            .site_url
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SITE_URL must be set in production"))?;
        Self::production(site_url)
    }

    /// Whether this is the single-origin production policy.
    pub fn is_production(&self) -> bool {
        self.trusted.is_some()
    }

    pub fn trusted(&self) -> Option<&TrustedOrigin> {
        self.trusted.as_ref()
    }

    /// Decides whether a request may proceed.
    pub fn check(&self, method: &Method, headers: &HeaderMap) -> Result<(), OriginRejection> {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            return Ok(());
        }

        let Some(trusted) = &self.trusted else {
            return Ok(());
        };

        let asserted = if let Some(origin) = headers.get(header::ORIGIN) {
            asserted_origin(origin, "Origin")?
        } else if let Some(referer) = headers.get(header::REFERER) {
            asserted_origin(referer, "Referer")?
        } else {
            return Err(OriginRejection::MissingOrigin);
        };

        if asserted == trusted.origin {
            Ok(())
        } else {
            Err(OriginRejection::Untrusted(asserted.ascii_serialization()))
        }
    }
}

/// Scheme, host and port of a header URL; paths are ignored.
fn asserted_origin(value: &HeaderValue, header: &'static str) -> Result<Origin, OriginRejection> {
    let malformed = || OriginRejection::Malformed { header };

    let url = value
        .to_str()
        .ok()
        .and_then(|raw| Url::parse(raw.trim()).ok())
        .ok_or_else(malformed)?;

    let origin = url.origin();
    if origin.is_tuple() {
        Ok(origin)
    } else {
        Err(malformed())
    }
}

/// A middleware that rejects cross-origin state-changing requests.
///
/// Runs before the session is loaded; a rejected request never touches it.
///
/// # Returns
///
/// The downstream response, or a 403 `AppError::Forbidden` naming the reason.
pub async fn verify_origin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match state.origin_policy.check(req.method(), req.headers()) {
        Ok(()) => next.run(req).await,
        Err(rejection) => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "❌ CSRF: {}",
                rejection
            );
            AppError::Forbidden(rejection.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OriginPolicy {
        OriginPolicy::production(&Url::parse("https://trusted.example").unwrap()).unwrap()
    }

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn safe_methods_always_pass() {
        let evil = headers(&[(header::ORIGIN, "https://evil.example")]);
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert_eq!(policy().check(&method, &evil), Ok(()));
            assert_eq!(policy().check(&method, &HeaderMap::new()), Ok(()));
        }
    }

    #[test]
    fn trusted_origin_passes_and_others_are_rejected() {
        let good = headers(&[(header::ORIGIN, "https://trusted.example")]);
        assert_eq!(policy().check(&Method::POST, &good), Ok(()));

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let evil = headers(&[(header::ORIGIN, "https://evil.example")]);
            assert_eq!(
                policy().check(&method, &evil),
                Err(OriginRejection::Untrusted("https://evil.example".into()))
            );
        }
    }

    #[test]
    fn scheme_and_port_are_part_of_the_origin() {
        for origin in ["http://trusted.example", "https://trusted.example:8443"] {
            let h = headers(&[(header::ORIGIN, origin)]);
            assert!(policy().check(&Method::POST, &h).is_err());
        }
        let default_port = headers(&[(header::ORIGIN, "https://trusted.example:443")]);
        assert_eq!(policy().check(&Method::POST, &default_port), Ok(()));
    }

    #[test]
    fn referer_is_used_when_origin_is_absent() {
        let good = headers(&[(header::REFERER, "https://trusted.example/users/new")]);
        assert_eq!(policy().check(&Method::POST, &good), Ok(()));

        let evil = headers(&[(header::REFERER, "https://evil.example/attack")]);
        assert!(policy().check(&Method::POST, &evil).is_err());

        let lookalike = headers(&[(header::REFERER, "https://trusted.example.evil.example/")]);
        assert!(policy().check(&Method::POST, &lookalike).is_err());
    }

    #[test]
    fn origin_takes_precedence_over_referer() {
        let h = headers(&[
            (header::ORIGIN, "https://evil.example"),
            (header::REFERER, "https://trusted.example/users/new"),
        ]);
        assert!(policy().check(&Method::POST, &h).is_err());
    }

    #[test]
    fn missing_or_opaque_origins_are_rejected() {
        assert_eq!(
            policy().check(&Method::POST, &HeaderMap::new()),
            Err(OriginRejection::MissingOrigin)
        );

        let null = headers(&[(header::ORIGIN, "null")]);
        assert_eq!(
            policy().check(&Method::POST, &null),
            Err(OriginRejection::Malformed { header: "Origin" })
        );
    }

    #[test]
    fn permissive_policy_trusts_everyone() {
        let evil = headers(&[(header::ORIGIN, "https://evil.example")]);
        assert_eq!(OriginPolicy::permissive().check(&Method::POST, &evil), Ok(()));
        assert_eq!(OriginPolicy::permissive().check(&Method::DELETE, &HeaderMap::new()), Ok(()));
        assert!(!OriginPolicy::permissive().is_production());
        assert!(policy().is_production());
    }
}
