use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Set by the TLS-terminating proxy in front of the server.
pub const FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Whether the proxy reports the client connection as plain HTTP.
///
/// The server never terminates TLS itself, so a request without the header
/// is taken as already secure.
pub fn forwarded_insecure(headers: &HeaderMap) -> bool {
    headers
        .get(&FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| !proto.trim().eq_ignore_ascii_case("https"))
}

/// A middleware that sends production clients on plain HTTP to the HTTPS
/// site with a 301.
///
/// The redirect always targets the configured site origin, never the
/// request's `Host`.
pub async fn require_https(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(trusted) = state.origin_policy.trusted() else {
        return next.run(req).await;
    };
    if !forwarded_insecure(req.headers()) {
        return next.run(req).await;
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let location = trusted.https_location(path_and_query);

    tracing::debug!("🔒 Redirecting plain HTTP request to {}", location);
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn proto(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_PROTO, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn only_forwarded_http_is_insecure() {
        assert!(forwarded_insecure(&proto("http")));
        assert!(forwarded_insecure(&proto("http, https")));
        assert!(!forwarded_insecure(&proto("HTTPS")));
        assert!(!forwarded_insecure(&HeaderMap::new()));
    }
}
