//! HTTP API server for shipment tracking.
//!
//! Provides REST endpoints for accounts, shipment creation, public tracking
//! and admin management, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use document_store::DocumentStore;
use domain::{AuthService, ShipmentService, TokenSigner};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub shipments: ShipmentService<S>,
    pub auth: AuthService<S>,
}

/// Builds the application state over one store.
pub fn create_state<S: DocumentStore + Clone + 'static>(
    store: S,
    signer: TokenSigner,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        shipments: ShipmentService::new(store.clone()),
        auth: AuthService::new(store, signer),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/auth/register", post(routes::auth::register::<S>))
        .route("/auth/login", post(routes::auth::login::<S>))
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/shipments",
            post(routes::shipments::create::<S>).get(routes::shipments::list_own::<S>),
        )
        .route("/shipments/track/{tracking_id}", get(routes::shipments::track::<S>))
        .route("/shipments/{id}", get(routes::shipments::get::<S>))
        .route("/admin/shipments", get(routes::admin::list_shipments::<S>))
        .route("/admin/shipments/{id}", delete(routes::admin::delete_shipment::<S>))
        .route("/admin/shipments/{id}/status", put(routes::admin::update_status::<S>))
        .route("/admin/shipments/{id}/payment", put(routes::admin::update_payment::<S>))
        .route("/admin/shipments/{id}/amount", put(routes::admin::update_amount::<S>))
        .route("/admin/users", get(routes::admin::list_users::<S>))
        .route("/admin/create", post(routes::admin::create_admin::<S>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", api)
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
