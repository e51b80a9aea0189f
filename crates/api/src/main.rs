//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use event_store::{EventStore, EventStreamPoller, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    InMemoryOrderRepository, PostgresOrderRepository, ProjectionRebuilder, ResettableRepository,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
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
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick storage backends
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let event_store = PostgresEventStore::new(pool.clone());
            event_store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL event store and read model");

            let repository = Arc::new(PostgresOrderRepository::new(pool));
            run(config, event_store, repository, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            let repository = Arc::new(InMemoryOrderRepository::new());
            run(config, InMemoryEventStore::new(), repository, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}

async fn run<S, R>(config: Config, event_store: S, repository: Arc<R>, metrics_handle: PrometheusHandle)
where
    S: EventStore + Clone + 'static,
    R: ResettableRepository + 'static,
{
    // 4. Catch the read model up with the event log
    if config.rebuild_projections_on_start {
        let stats = ProjectionRebuilder::new(event_store.clone())
            .rebuild(repository.as_ref())
            .await
            .expect("projection rebuild failed");
        tracing::info!(
            applied = stats.events_applied,
            skipped = stats.events_skipped,
            "read model caught up"
        );
    }

    // 5. Follow the event log in the background
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut subscription =
        EventStreamPoller::subscribe(event_store.clone(), config.stream_config(), shutdown_rx)
            .await
            .expect("failed to subscribe to event stream");
    let consumer = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            tracing::debug!(
                sequence = event.sequence,
                order_id = %event.aggregate_id,
                event_type = %event.event_type,
                "event stream delivered"
            );
        }
        subscription.join().await;
    });

    // 6. Build the application
    let state = api::create_state(event_store, repository, config.service_config()).await;
    let app = api::create_app(state, metrics_handle);

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 8. Stop the event stream consumer
    if let Err(e) = shutdown_tx.send(true) {
        tracing::warn!(error = %e, "event stream already stopped");
    }
    if let Err(e) = consumer.await {
        tracing::warn!(error = %e, "event stream consumer panicked");
    }
}
