use axum::http::{header::HeaderName, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const ALLOW_HEADERS: [&str; 7] = [
    "content-type",
    "accesstoken",
    "x-csrf-token",
    "authorization",
    "token",
    "wos-auth-session",
    "tid",
];

const EXPOSE_HEADERS: [&str; 4] = [
    "content-length",
    "access-control-allow-origin",
    "access-control-allow-headers",
    "content-type",
];

/// CORS for browser clients on any origin: the request `Origin` is echoed
/// back and credentials are allowed. Preflights are answered by the layer.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS, Method::DELETE])
        .allow_headers(ALLOW_HEADERS.map(HeaderName::from_static))
        .expose_headers(EXPOSE_HEADERS.map(HeaderName::from_static))
}
