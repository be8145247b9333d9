use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static AUTH_METRICS: OnceLock<Option<AuthMetrics>> = OnceLock::new();

struct AuthMetrics {
    registry: Registry,
    attempts: IntCounterVec,
    magic_links_issued: IntCounter,
}

/// Install the HTTP metrics recorder and register the auth counters.
/// Later calls are no-ops.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!("Prometheus recorder not installed: {}", e);
        }
        handle
    });
    auth_metrics();
}

fn auth_metrics() -> Option<&'static AuthMetrics> {
    AUTH_METRICS
        .get_or_init(|| match build_auth_metrics() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::error!("Failed to initialize auth metrics: {}", e);
                None
            }
        })
        .as_ref()
}

fn build_auth_metrics() -> Result<AuthMetrics, prometheus::Error> {
    let registry = Registry::new();

    let attempts = IntCounterVec::new(
        Opts::new(
            "guest_auth_attempts_total",
            "Guest authentication attempts by method and outcome",
        ),
        &["method", "outcome"],
    )?;
    let magic_links_issued = IntCounter::new(
        "magic_links_issued_total",
        "Magic link tokens issued",
    )?;

    registry.register(Box::new(attempts.clone()))?;
    registry.register(Box::new(magic_links_issued.clone()))?;

    Ok(AuthMetrics {
        registry,
        attempts,
        magic_links_issued,
    })
}

/// `method` is `email_matching` or `magic_link`; `outcome` is a short
/// reason such as `success`, `not_found` or `token_used`.
pub fn record_attempt(method: &str, outcome: &str) {
    if let Some(m) = auth_metrics() {
        m.attempts.with_label_values(&[method, outcome]).inc();
    }
}

pub fn record_magic_link_issued() {
    if let Some(m) = auth_metrics() {
        m.magic_links_issued.inc();
    }
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(m) = auth_metrics() {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&m.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        if let Ok(custom) = String::from_utf8(buffer) {
            output.push_str(&custom);
        }
    }

    output
}
