//! Structured access logging.
//!
//! One record per request, emitted after the downstream chain returns:
//!
//! - static assets and requests matched by the ignore predicate are skipped
//!   before the body is touched
//! - `HEAD` requests are never logged
//! - bodies larger than `max_body` are passed through without capture and
//!   the request is not logged
//! - any status outside 2xx/304 is logged at `WARN` together with the
//!   request body and raw query string, whatever the threshold
//! - 2xx/304 are logged at `INFO` only when no threshold is set or the
//!   request took longer than it
//!
//! The middleware is observational. Nothing that fails in here changes the
//! response the client gets.

use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, request::Parts, HeaderMap, Method, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::Level;

use crate::{error::ErrorNote, metrics::ACCESS_METRICS};

use super::{client_ip::client_ip, request_id::request_id};

/// Path suffixes treated as static media.
pub const STATIC_MEDIA_SUFFIXES: [&str; 8] =
    [".css", ".js", ".html", ".png", ".gif", ".jpg", ".jpeg", ".ico"];

/// Keys written by [`LogRecord`] itself. Custom fields may not reuse them.
pub const RESERVED_FIELDS: [&str; 12] = [
    "mod", "latency", "ip", "method", "path", "lat", "ua", "requestId", "err", "body", "query",
    "status",
];

/// Body capture limit, the same as axum's `DefaultBodyLimit`.
pub const DEFAULT_MAX_BODY: usize = 2 * 1024 * 1024;

const MODULE_TAG: &str = "http";

pub fn is_static_media(path: &str) -> bool {
    STATIC_MEDIA_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Read-only view of an inbound request.
pub trait RequestView {
    fn method(&self) -> &Method;
    fn path(&self) -> &str;
    fn query(&self) -> Option<&str>;
    fn header(&self, name: &str) -> Option<&str>;
    fn client_ip(&self) -> Option<String>;
    fn request_id(&self) -> Option<&str>;

    /// Buffered request body, when it has been captured.
    fn body(&self) -> Option<&[u8]> {
        None
    }
}

impl RequestView for Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        self.uri.path()
    }

    fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn client_ip(&self) -> Option<String> {
        client_ip(self)
    }

    fn request_id(&self) -> Option<&str> {
        request_id(self)
    }
}

/// What the downstream chain produced.
pub trait ResponseOutcome {
    fn status(&self) -> StatusCode;
    /// Error note attached by the handler, not visible to the client.
    fn error(&self) -> Option<&str>;
}

impl ResponseOutcome for Response {
    fn status(&self) -> StatusCode {
        Response::status(self)
    }

    fn error(&self) -> Option<&str> {
        self.extensions()
            .get::<ErrorNote>()
            .map(|note| note.0.as_str())
    }
}

/// Request data captured before dispatch, so the handler is free to consume
/// the original.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    client_ip: Option<String>,
    request_id: Option<String>,
    body: Bytes,
}

impl RequestSnapshot {
    pub fn new(parts: &Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            client_ip: client_ip(parts),
            request_id: request_id(parts).map(str::to_owned),
            body,
        }
    }
}

impl RequestView for RequestSnapshot {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        self.uri.path()
    }

    fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn client_ip(&self) -> Option<String> {
        self.client_ip.clone()
    }

    fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    fn body(&self) -> Option<&[u8]> {
        Some(&self.body)
    }
}

pub type FieldGetter = Arc<dyn Fn(&dyn RequestView) -> Value + Send + Sync>;
pub type IgnoreFn = Arc<dyn Fn(&dyn RequestView) -> bool + Send + Sync>;

/// Access log settings, fixed for the lifetime of the logger.
#[derive(Clone)]
pub struct LogConfig {
    /// Successful requests faster than this are not logged. Zero logs all of them.
    pub threshold: Duration,
    /// Extra fields, evaluated per logged request.
    pub fields: BTreeMap<String, FieldGetter>,
    pub ignore_static_media: bool,
    pub ignore: Option<IgnoreFn>,
    /// Requests with a larger body are forwarded uncaptured and not logged.
    pub max_body: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::ZERO,
            fields: BTreeMap::new(),
            ignore_static_media: true,
            ignore: None,
            max_body: DEFAULT_MAX_BODY,
        }
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("threshold", &self.threshold)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("ignore_static_media", &self.ignore_static_media)
            .field("ignore", &self.ignore.is_some())
            .field("max_body", &self.max_body)
            .finish()
    }
}

impl LogConfig {
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Adds a custom field. A name that clashes with a built-in record key
    /// is stored with a `field_` prefix.
    pub fn with_field<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&dyn RequestView) -> Value + Send + Sync + 'static,
    {
        let mut name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            name = format!("field_{name}");
        }
        self.fields.insert(name, Arc::new(getter));
        self
    }

    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    pub fn with_ignore_static_media(mut self, ignore: bool) -> Self {
        self.ignore_static_media = ignore;
        self
    }

    pub fn with_ignore<F>(mut self, ignore: F) -> Self
    where
        F: Fn(&dyn RequestView) -> bool + Send + Sync + 'static,
    {
        self.ignore = Some(Arc::new(ignore));
        self
    }

    /// Whether the request is skipped before any work is done for it.
    pub fn skips(&self, request: &dyn RequestView) -> bool {
        if self.ignore_static_media && is_static_media(request.path()) {
            return true;
        }
        self.ignore.as_ref().is_some_and(|ignore| ignore(request))
    }

    fn logs_success(&self, elapsed: Duration) -> bool {
        self.threshold.is_zero() || elapsed > self.threshold
    }
}

/// One access log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(rename = "mod")]
    pub module: &'static str,
    pub latency: String,
    pub ip: String,
    pub method: String,
    pub path: String,
    /// Latency in milliseconds with two decimals.
    pub lat: String,
    pub ua: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub status: u16,
}

impl LogRecord {
    fn assemble(
        config: &LogConfig,
        request: &dyn RequestView,
        outcome: &dyn ResponseOutcome,
        elapsed: Duration,
    ) -> Self {
        let fields = config
            .fields
            .iter()
            .map(|(name, getter)| (name.clone(), getter(request)))
            .collect();

        Self {
            module: MODULE_TAG,
            latency: format!("{elapsed:?}"),
            ip: request.client_ip().unwrap_or_default(),
            method: request.method().to_string(),
            path: request.path().to_string(),
            lat: format_millis(elapsed),
            ua: request.header("user-agent").unwrap_or_default().to_string(),
            request_id: request.request_id().unwrap_or_default().to_string(),
            fields,
            err: outcome.error().map(str::to_owned),
            body: None,
            query: None,
            status: outcome.status().as_u16(),
        }
    }
}

/// 2xx and 304. Everything else is logged with the request payload.
pub fn is_success_class(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_MODIFIED
}

pub fn format_millis(elapsed: Duration) -> String {
    format!("{:.2}", elapsed.as_secs_f64() * 1000.0)
}

/// Destination for access log records.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: Level, record: &LogRecord, message: &str);
}

/// Forwards records to `tracing` under the `gateway_kit::access` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! access_event {
    ($level:expr, $record:expr, $fields:expr, $message:expr) => {
        tracing::event!(
            target: "gateway_kit::access",
            $level,
            module = $record.module,
            latency = %$record.latency,
            ip = %$record.ip,
            method = %$record.method,
            path = %$record.path,
            lat = %$record.lat,
            ua = %$record.ua,
            request_id = %$record.request_id,
            status = $record.status,
            fields = %$fields,
            err = $record.err.as_deref(),
            body = $record.body.as_deref(),
            query = $record.query.as_deref(),
            "{}",
            $message
        )
    };
}

impl LogSink for TracingSink {
    fn emit(&self, level: Level, record: &LogRecord, message: &str) {
        let fields = serde_json::to_string(&record.fields).unwrap_or_default();
        if level == Level::ERROR {
            access_event!(Level::ERROR, record, fields, message);
        } else if level == Level::WARN {
            access_event!(Level::WARN, record, fields, message);
        } else {
            access_event!(Level::INFO, record, fields, message);
        }
    }
}

/// Shared access logger state, cheap to clone into every request.
#[derive(Clone)]
pub struct AccessLogger {
    config: Arc<LogConfig>,
    sink: Arc<dyn LogSink>,
}

impl AccessLogger {
    pub fn new(config: LogConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    /// Logger that writes through `tracing`.
    pub fn with_tracing(config: LogConfig) -> Self {
        Self::new(config, Arc::new(TracingSink))
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Applies the emission policy to a finished exchange. `HEAD` requests
    /// are expected to have been filtered out already.
    pub fn record(
        &self,
        request: &dyn RequestView,
        outcome: &dyn ResponseOutcome,
        elapsed: Duration,
    ) {
        let mut record = LogRecord::assemble(&self.config, request, outcome, elapsed);
        let status = outcome.status();

        if !is_success_class(status) {
            let captured = request.body().unwrap_or_default();
            record.body = Some(String::from_utf8_lossy(captured).into_owned());
            record.query = Some(request.query().unwrap_or_default().to_owned());
            self.sink.emit(Level::WARN, &record, status.as_str());
            ACCESS_METRICS.logged_total.increment(1);
            return;
        }

        if self.config.logs_success(elapsed) {
            self.sink.emit(Level::INFO, &record, status.as_str());
            ACCESS_METRICS.logged_total.increment(1);
        } else {
            ACCESS_METRICS.suppressed_total.increment(1);
        }
    }
}

impl fmt::Debug for AccessLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

enum Capture {
    Complete(Bytes),
    /// Over the limit. The body is rebuilt from what was read plus the rest.
    Oversized(Body),
    Failed,
}

async fn capture(parts: &Parts, body: Body, limit: usize) -> Capture {
    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Capture::Oversized(body);
    }

    let mut data = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut size = 0usize;
    while let Some(chunk) = data.next().await {
        let Ok(chunk) = chunk else {
            return Capture::Failed;
        };
        size += chunk.len();
        chunks.push(chunk);
        if size > limit {
            let head = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
            return Capture::Oversized(Body::from_stream(head.chain(data)));
        }
    }

    match chunks.len() {
        0 => Capture::Complete(Bytes::new()),
        1 => Capture::Complete(chunks.remove(0)),
        _ => Capture::Complete(Bytes::from(chunks.concat::<u8>())),
    }
}

/// Axum middleware, install with `axum::middleware::from_fn_with_state`.
pub async fn access_log(
    State(logger): State<AccessLogger>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    if logger.config.skips(&parts) {
        ACCESS_METRICS.suppressed_total.increment(1);
        return next.run(Request::from_parts(parts, body)).await;
    }

    let captured = match capture(&parts, body, logger.config.max_body).await {
        Capture::Complete(bytes) => bytes,
        Capture::Oversized(body) => {
            ACCESS_METRICS.suppressed_total.increment(1);
            return next.run(Request::from_parts(parts, body)).await;
        }
        Capture::Failed => {
            // Unreadable body: the handler still runs, nothing is logged.
            return next.run(Request::from_parts(parts, Body::empty())).await;
        }
    };

    let snapshot = RequestSnapshot::new(&parts, captured.clone());
    let request = Request::from_parts(parts, Body::from(captured));

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed();

    ACCESS_METRICS
        .latency_seconds
        .record(elapsed.as_secs_f64());

    if snapshot.method == Method::HEAD {
        ACCESS_METRICS.suppressed_total.increment(1);
        return response;
    }

    logger.record(&snapshot, &response, elapsed);
    response
}
