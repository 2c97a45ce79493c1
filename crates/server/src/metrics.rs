//! Prometheus metrics for the DSS server.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! It exposes aggregate counts only (no keys, names, or tags), but should
//! still be reachable from the scraper network only.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Registry served at `/metrics`.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help).expect("metric creation failed")
}

pub static UPLOADS: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_uploads_total", "Files stored"));

pub static BYTES_UPLOADED: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_bytes_uploaded_total", "Bytes of stored files"));

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("dss_upload_errors_total", "Rejected or failed uploads by reason"),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "dss_upload_duration_seconds",
            "Time to receive, stage, and commit an upload",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_downloads_total", "Files served"));

pub static ORPHANS_DETECTED: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_orphans_detected_total", "Catalog rows found without a blob"));

pub static LIST_QUERIES: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_list_queries_total", "Listing queries served"));

pub static AUTH_FAILURES: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_auth_failures_total", "Requests rejected by the token gate"));

pub static HEARTBEATS: LazyLock<IntCounter> =
    LazyLock::new(|| counter("dss_heartbeats_total", "Successful liveness probes"));

static REGISTER_ONCE: Once = Once::new();

/// Register every collector with [`REGISTRY`]. Later calls do nothing.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: [Box<dyn Collector>; 9] = [
            Box::new(UPLOADS.clone()),
            Box::new(BYTES_UPLOADED.clone()),
            Box::new(UPLOAD_ERRORS.clone()),
            Box::new(UPLOAD_DURATION.clone()),
            Box::new(DOWNLOADS.clone()),
            Box::new(ORPHANS_DETECTED.clone()),
            Box::new(LIST_QUERIES.clone()),
            Box::new(AUTH_FAILURES.clone()),
            Box::new(HEARTBEATS.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// Text exposition of [`REGISTRY`].
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut body) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], body).into_response()
}

/// Count a failed upload under `reason`.
pub fn record_upload_error(reason: &str) {
    UPLOAD_ERRORS.with_label_values(&[reason]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();
        record_upload_error("bad_request");

        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "dss_upload_errors_total"));
        assert!(names.iter().any(|n| n == "dss_auth_failures_total"));
    }
}
