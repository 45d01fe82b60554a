//! HTTP API server for the point-of-sale order core.
//!
//! Exposes order commit, lookup, status change and profit analytics over
//! REST, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{CommitCoordinator, CommitError, IntentRecovery, OrderNumberGenerator, RecoveryReport, StatusTransition};
use store::Backend;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
    pub coordinator: CommitCoordinator<S>,
    pub status: StatusTransition<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route("/orders/analytics/profit", get(routes::orders::profit::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the application state over `store`.
///
/// The order number sequence continues from the number of stored orders.
pub async fn create_state<S: Backend>(
    store: S,
    number_retries: u32,
) -> Result<Arc<AppState<S>>, CommitError> {
    let numbers = Arc::new(OrderNumberGenerator::seeded_from(&store).await?);
    let coordinator =
        CommitCoordinator::new(store.clone(), numbers).with_number_retries(number_retries);
    let status = StatusTransition::new(store.clone());

    Ok(Arc::new(AppState {
        store,
        coordinator,
        status,
    }))
}

/// Settles commit journal intents left open by an earlier run.
///
/// Must complete before the server accepts requests.
pub async fn recover<S: Backend>(store: S) -> Result<RecoveryReport, CommitError> {
    IntentRecovery::new(store).recover().await
}
