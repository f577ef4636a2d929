//! Prometheus exposition of the ordering counters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers descriptions for the counters the domain services emit.
pub fn describe() {
    metrics::describe_counter!("orders_created_total", "Orders placed from a cart");
    metrics::describe_counter!(
        "cart_lines_upserted_total",
        "Cart lines added or replaced"
    );
    metrics::describe_counter!("orders_deleted_total", "Orders deleted by a manager");
    metrics::describe_counter!(
        "order_updates_total",
        "Crew assignments and status changes written"
    );
}

/// GET /metrics in the Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
