//! Prometheus HTTP metrics, exposed at `/metrics` in the text format.
//!
//! Collected per request, labelled by method, matched route and status:
//! - `yalp_http_requests_total` (counter)
//! - `yalp_http_requests_duration_seconds` (histogram)
//! - `yalp_http_requests_pending` (gauge, method and route only)

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::ApiError;
use crate::state::AppState;

pub const METRICS_PREFIX: &str = "yalp";

/// Metric families for one application instance. Each instance owns its
/// registry, so several routers can live in one process.
pub struct HttpMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
    pending: IntGaugeVec,
}

impl HttpMetrics {
    pub fn new(prefix: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(prefix.to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "status"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("http_requests_duration_seconds", "HTTP request latency"),
            &["method", "endpoint", "status"],
        )?;
        let pending = IntGaugeVec::new(
            Opts::new("http_requests_pending", "HTTP requests in flight"),
            &["method", "endpoint"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(pending.clone()))?;

        Ok(Self { registry, requests, duration, pending })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Records every request. Unmatched paths share one label so scanners
/// cannot blow up the series count.
pub async fn track(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().as_str().to_owned();

    let metrics = &state.metrics;
    let pending = metrics.pending.with_label_values(&[method.as_str(), endpoint.as_str()]);
    pending.inc();
    let started = Instant::now();

    let response = next.run(request).await;

    pending.dec();
    let status = response.status().as_u16().to_string();
    metrics.requests.with_label_values(&[method.as_str(), endpoint.as_str(), status.as_str()]).inc();
    metrics
        .duration
        .with_label_values(&[method.as_str(), endpoint.as_str(), status.as_str()])
        .observe(started.elapsed().as_secs_f64());

    response
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        ApiError::internal("Failed to encode metrics")
    })?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}
