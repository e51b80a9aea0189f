//! HTTP API server for the order tracking service.
//!
//! Exposes order commands and queries over REST, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{OrderService, OrderServiceConfig};
use projections::{EventBus, InMemoryEventBus, OrderRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/tracking/{tracking_number}",
            get(routes::orders::get_by_tracking::<S>),
        )
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/notes", post(routes::orders::add_note::<S>))
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
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

/// Wires a repository to a fresh in-process event bus and builds the state.
pub async fn create_state<S, R>(
    event_store: S,
    repository: Arc<R>,
    config: OrderServiceConfig,
) -> Arc<AppState<S>>
where
    S: EventStore + 'static,
    R: OrderRepository + 'static,
{
    let bus = InMemoryEventBus::new();
    bus.subscribe(repository.clone(), &[]).await;

    let order_service = OrderService::new(event_store, repository, Arc::new(bus)).with_config(config);
    Arc::new(AppState { order_service })
}
