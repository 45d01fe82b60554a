//! API server entry point.

use api::config::{Config, LogFormat};
use api::seed::SeedData;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{Backend, InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Recovers the journal, builds the app over `store` and serves until shutdown.
async fn serve<S: Backend>(store: S, config: &Config, metrics_handle: PrometheusHandle) {
    let report = api::recover(store.clone())
        .await
        .expect("commit journal recovery failed");
    if report.unsettled > 0 {
        tracing::warn!(
            unsettled = report.unsettled,
            "some intents could not be settled and will be retried on next start"
        );
    }

    let state = api::create_state(store, config.order_number_retries)
        .await
        .expect("failed to build application state");
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, env = %config.app_env, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);
    api::error::expose_error_detail(!config.is_production());

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    // 3. Open the backing store and serve
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL store");
            serve(store, &config, metrics_handle).await;
        }
        None => {
            let store = InMemoryStore::new();
            if let Some(path) = &config.seed_file {
                SeedData::load(path)
                    .expect("failed to load seed file")
                    .apply(&store)
                    .await;
            }
            tracing::info!("using in-memory store");
            serve(store, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
