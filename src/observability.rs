use std::net::SocketAddr;

use anyhow::Context;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations. Labels: operation, outcome.
pub const OPERATIONS_TOTAL: &str = "qwishi_operations_total";

/// Histogram: engine operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "qwishi_operation_duration_seconds";

/// Counter: calls to the scheduling platform. Labels: call, outcome.
pub const GATEWAY_CALLS_TOTAL: &str = "qwishi_gateway_calls_total";

/// Histogram: platform call latency in seconds. Labels: call.
pub const GATEWAY_DURATION_SECONDS: &str = "qwishi_gateway_duration_seconds";

// ── Business counters ───────────────────────────────────────────

/// Counter: openings created through QwiSHi.
pub const OPENINGS_CREATED_TOTAL: &str = "qwishi_openings_created_total";

/// Counter: openings filled through QwiSHi.
pub const OPENINGS_FILLED_TOTAL: &str = "qwishi_openings_filled_total";

/// Gauge: openings held in the store.
pub const OPENINGS_TRACKED: &str = "qwishi_openings_tracked";

/// Counter: post-booking hook failures.
pub const CLEANUP_FAILURES_TOTAL: &str = "qwishi_cleanup_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> anyhow::Result<()> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus metrics exporter")?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Outcome label for an operation result.
pub fn outcome_label<T>(result: &Result<T, crate::engine::EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
