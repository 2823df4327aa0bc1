use std::time::Duration;

use http::{header, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::middleware_layer::csrf::OriginPolicy;

/// CORS headers for every response, including ones the origin guard rejects.
///
/// Installed outside the guard so browsers can report a blocked request to
/// client code instead of an opaque network error. Production allows only the
/// trusted origin; elsewhere the request origin is mirrored back.
pub fn cors_layer(policy: &OriginPolicy, max_age: Duration) -> CorsLayer {
    let allow_origin = match policy.trusted() {
        Some(trusted) => AllowOrigin::exact(trusted.header_value().clone()),
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(max_age)
}
