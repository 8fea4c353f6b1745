use axum::http::Request;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gateway_kit::middleware::{access_log::is_static_media, LogConfig, LogRecord};
use std::collections::BTreeMap;

fn static_media_benchmark(c: &mut Criterion) {
    c.bench_function("is_static_media", |b| {
        b.iter(|| {
            black_box(is_static_media(black_box("/assets/vendor/app.min.js")));
            black_box(is_static_media(black_box("/api/v1/orders/42")));
        })
    });
}

fn skip_check_benchmark(c: &mut Criterion) {
    let config = LogConfig::default().with_ignore(|req| req.path().starts_with("/internal"));
    let (parts, _) = Request::builder()
        .uri("/api/v1/orders?page=2")
        .body(())
        .unwrap()
        .into_parts();

    c.bench_function("log_config_skips", |b| {
        b.iter(|| black_box(config.skips(black_box(&parts))))
    });
}

fn record_serialization_benchmark(c: &mut Criterion) {
    let record = LogRecord {
        module: "http",
        latency: "2.31ms".to_string(),
        ip: "10.0.0.1".to_string(),
        method: "POST".to_string(),
        path: "/api/v1/orders".to_string(),
        lat: "2.31".to_string(),
        ua: "curl/8.0".to_string(),
        request_id: uuid::Uuid::new_v4().to_string(),
        fields: BTreeMap::from([("tenant".to_string(), serde_json::json!("acme"))]),
        err: None,
        body: Some(r#"{"sku":"A1","qty":3}"#.to_string()),
        query: Some("debug=1".to_string()),
        status: 500,
    };

    c.bench_function("log_record_serialization", |b| {
        b.iter(|| black_box(serde_json::to_string(&record).unwrap()))
    });
}

criterion_group!(
    benches,
    static_media_benchmark,
    skip_check_benchmark,
    record_serialization_benchmark
);
criterion_main!(benches);
