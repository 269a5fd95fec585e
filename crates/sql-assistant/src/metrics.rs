use prometheus::{Encoder, TextEncoder, Registry, IntCounterVec, IntGauge, Histogram, HistogramOpts};
use lazy_static::lazy_static;
use std::sync::OnceLock;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static PIPELINE_OUTCOMES: OnceLock<IntCounterVec> = OnceLock::new();
static TRACKED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();
static GENERATION_LATENCY: OnceLock<Histogram> = OnceLock::new();
static EXECUTION_LATENCY: OnceLock<Histogram> = OnceLock::new();

fn register<M>(slot: &OnceLock<M>, metric: prometheus::Result<M>)
where
    M: prometheus::core::Collector + Clone + 'static,
{
    match metric {
        Ok(metric) => {
            if slot.set(metric.clone()).is_ok() {
                REGISTRY.register(Box::new(metric)).ok();
            }
        }
        Err(e) => warn!("Failed to create metric: {}", e),
    }
}

/// Register all collectors. Safe to call more than once.
pub fn init_metrics() {
    register(
        &REQ_COUNTER,
        IntCounterVec::new(
            prometheus::opts!("requests_total", "Total requests per route"),
            &["route", "status"],
        ),
    );
    register(
        &PIPELINE_OUTCOMES,
        IntCounterVec::new(
            prometheus::opts!("pipeline_outcomes_total", "Chat pipeline results by outcome"),
            &["outcome"],
        ),
    );
    register(
        &TRACKED_SESSIONS,
        IntGauge::new("tracked_sessions", "Sessions currently holding conversation history"),
    );
    register(
        &GENERATION_LATENCY,
        Histogram::with_opts(HistogramOpts::new(
            "generation_latency_seconds",
            "Time spent waiting for the language model",
        )),
    );
    register(
        &EXECUTION_LATENCY,
        Histogram::with_opts(HistogramOpts::new(
            "execution_latency_seconds",
            "Time spent executing validated queries",
        )),
    );
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_outcome(outcome: &str) {
    if let Some(counter) = PIPELINE_OUTCOMES.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn set_tracked_sessions(count: usize) {
    if let Some(gauge) = TRACKED_SESSIONS.get() {
        gauge.set(count as i64);
    }
}

pub fn observe_generation(seconds: f64) {
    if let Some(histogram) = GENERATION_LATENCY.get() {
        histogram.observe(seconds);
    }
}

pub fn observe_execution(seconds: f64) {
    if let Some(histogram) = EXECUTION_LATENCY.get() {
        histogram.observe(seconds);
    }
}

/// Prometheus text exposition of everything registered so far
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(feature = "cli")]
pub async fn get_metrics() -> axum::response::Response {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    match render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Metrics encoding failed: {}", e)).into_response(),
    }
}
