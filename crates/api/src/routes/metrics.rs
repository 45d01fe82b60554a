//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for every metric the order core emits.
pub fn describe() {
    metrics::describe_counter!("orders_committed_total", "Orders committed");
    metrics::describe_counter!(
        "order_commit_failures_total",
        "Rejected or failed order commits, by reason"
    );
    metrics::describe_histogram!(
        "order_commit_duration_seconds",
        Unit::Seconds,
        "Time spent committing an order"
    );
    metrics::describe_counter!(
        "inventory_compensations_total",
        "Commits that released reservations after a failure"
    );
    metrics::describe_counter!("orders_cancelled_total", "Orders cancelled with restock");
    metrics::describe_counter!(
        "inventory_low_stock_total",
        "Reservations that left a product at or below its low-stock threshold"
    );
    metrics::describe_counter!(
        "commit_intents_recovered_total",
        "Journal intents settled at start-up, by outcome"
    );
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
