use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the worker's metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("edit_jobs_claimed", "Jobs moved from pending to processing");
    metrics::describe_counter!("edit_jobs_completed", "Jobs published and marked done");
    metrics::describe_counter!("edit_jobs_failed", "Jobs marked failed");
    metrics::describe_counter!(
        "edit_jobs_recovered",
        "Stuck processing jobs reset to pending at startup"
    );
    metrics::describe_histogram!(
        "edit_job_processing_seconds",
        "Time from claim to done/failed for one job"
    );
    metrics::describe_gauge!("edit_jobs_pending", "Pending jobs seen by the last poll");

    Ok(Arc::new(handle))
}

/// GET /metrics: Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
