use axum::{
    extract::Request,
    http::{header::STRICT_TRANSPORT_SECURITY, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

/// Adds `Strict-Transport-Security` when the request reached the proxy over HTTPS.
pub async fn hsts_middleware(request: Request, next: Next) -> Response {
    let secure = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    let mut response = next.run(request).await;
    if secure {
        response
            .headers_mut()
            .insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS_VALUE));
    }
    response
}
