use axum::http::{header::HeaderName, request::Parts};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layers that assign a UUID `x-request-id` to requests arriving without one
/// and echo the id back on the response.
///
/// Apply the `SetRequestIdLayer` outside of anything that reads the id.
pub fn request_id_layers() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    (
        SetRequestIdLayer::new(header.clone(), MakeRequestUuid),
        PropagateRequestIdLayer::new(header),
    )
}

/// Returns the correlation id of the request, if one was assigned.
pub fn request_id(parts: &Parts) -> Option<&str> {
    parts
        .extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| {
            parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
        })
}
