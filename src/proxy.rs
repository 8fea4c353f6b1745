//! Reverse proxy for static sites kept in object storage.
//!
//! Directory-like paths (no `.` in the last segment) are rewritten to their
//! `index.html`. Upstream failures of any kind answer `404 not found`, so
//! nothing about the backend leaks to clients.

use std::time::{Duration, Instant};

use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tracing::warn;
use url::Url;

use crate::metrics::PROXY_METRICS;

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

#[derive(Debug, Clone)]
pub struct ReverseProxy {
    target: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl ReverseProxy {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Router that forwards every request it sees.
    pub fn router(self) -> Router {
        Router::new().fallback(proxy_handler).with_state(self)
    }

    /// Upstream URL for a request path and raw query.
    pub fn rewrite(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.target.clone();

        let mut joined = format!(
            "{}/{}",
            self.target.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let last = joined.rsplit('/').next().unwrap_or_default();
        if !last.contains('.') {
            if !joined.ends_with('/') {
                joined.push('/');
            }
            joined.push_str("index.html");
        }
        url.set_path(&joined);

        let query = match (self.target.query(), query) {
            (Some(t), Some(q)) if !t.is_empty() && !q.is_empty() => Some(format!("{t}&{q}")),
            (Some(t), _) if !t.is_empty() => Some(t.to_string()),
            (_, Some(q)) if !q.is_empty() => Some(q.to_string()),
            _ => None,
        };
        url.set_query(query.as_deref());
        url
    }

    pub async fn forward(&self, request: Request) -> Response {
        let start = Instant::now();
        PROXY_METRICS.requests_total.increment(1);

        let response = self.try_forward(request).await;
        PROXY_METRICS
            .latency_seconds
            .record(start.elapsed().as_secs_f64());

        response.unwrap_or_else(|e| {
            PROXY_METRICS.failures_total.increment(1);
            warn!(error = %e, "proxy request failed");
            not_found()
        })
    }

    async fn try_forward(&self, request: Request) -> anyhow::Result<Response> {
        let (parts, body) = request.into_parts();
        let url = self.rewrite(parts.uri.path(), parts.uri.query());
        let body = body::to_bytes(body, usize::MAX).await?;

        let upstream = self
            .client
            .request(parts.method.clone(), url.clone())
            .headers(forwardable(&parts.headers))
            .body(body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = upstream.status();
        if status.as_u16() >= 400 {
            let detail = upstream.text().await.unwrap_or_default();
            PROXY_METRICS.failures_total.increment(1);
            warn!(
                upstream = %url,
                status = status.as_u16(),
                body = %detail,
                "proxy fail"
            );
            return Ok(not_found());
        }

        let headers = forwardable(upstream.headers());
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

pub async fn proxy_handler(State(proxy): State<ReverseProxy>, request: Request) -> Response {
    proxy.forward(request).await
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP.contains(&name.as_str()) && name.as_str() != "content-length" {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}
