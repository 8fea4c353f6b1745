use metrics::{counter, histogram, Counter, Histogram};
use once_cell::sync::Lazy;

pub struct AccessMetrics {
    pub logged_total: Counter,
    pub suppressed_total: Counter,
    pub latency_seconds: Histogram,
}

pub static ACCESS_METRICS: Lazy<AccessMetrics> = Lazy::new(|| AccessMetrics {
    logged_total: counter!("gateway_kit_access_logged_total"),
    suppressed_total: counter!("gateway_kit_access_suppressed_total"),
    latency_seconds: histogram!("gateway_kit_request_latency_seconds"),
});

pub struct ProxyMetrics {
    pub requests_total: Counter,
    pub failures_total: Counter,
    pub latency_seconds: Histogram,
}

pub static PROXY_METRICS: Lazy<ProxyMetrics> = Lazy::new(|| ProxyMetrics {
    requests_total: counter!("gateway_kit_proxy_requests_total"),
    failures_total: counter!("gateway_kit_proxy_failures_total"),
    latency_seconds: histogram!("gateway_kit_proxy_latency_seconds"),
});
