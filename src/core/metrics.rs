use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("http_requests_total", "HTTP responses by status");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP response latency by status"
    );
    metrics::describe_counter!("grading_runs_total", "Grading runs by terminal outcome");
    metrics::describe_histogram!(
        "grading_run_duration_seconds",
        "Wall time of completed grading runs"
    );

    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
