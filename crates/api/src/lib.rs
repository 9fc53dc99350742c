//! HTTP API server for carts, checkout, orders and inventory.
//!
//! Provides REST endpoints over the commerce services, with structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use commerce::{
    CartService, CheckoutOrchestrator, CommerceConfig, InventoryLedger, OrderService,
    SimulatedGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub carts: CartService<S>,
    pub ledger: InventoryLedger<S>,
    pub checkout: CheckoutOrchestrator<S, SimulatedGateway>,
    pub orders: OrderService<S, SimulatedGateway>,
    pub gateway: SimulatedGateway,
    pub config: CommerceConfig,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // cart
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{item_id}",
            patch(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/clear", delete(routes::cart::clear::<S>))
        .route("/cart/sync", post(routes::cart::sync::<S>))
        .route("/cart/claim", post(routes::cart::claim::<S>))
        // customer orders
        .route("/orders/checkout", post(routes::orders::checkout::<S>))
        .route("/orders/my-orders", get(routes::orders::list_mine::<S>))
        .route("/orders/my-orders/{id}", get(routes::orders::get_mine::<S>))
        .route(
            "/orders/my-orders/{id}/cancel",
            post(routes::orders::cancel_mine::<S>),
        )
        // admin orders
        .route("/orders", get(routes::orders::list::<S>))
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::remove::<S>),
        )
        .route("/orders/{id}/status", patch(routes::orders::update_status::<S>))
        .route(
            "/orders/{id}/transactions",
            get(routes::orders::transactions::<S>),
        )
        // admin inventory
        .route(
            "/inventory/locations",
            get(routes::inventory::list_locations::<S>).post(routes::inventory::create_location::<S>),
        )
        .route(
            "/inventory/locations/{id}",
            get(routes::inventory::get_location::<S>)
                .patch(routes::inventory::update_location::<S>)
                .delete(routes::inventory::deactivate_location::<S>),
        )
        .route("/inventory/levels", get(routes::inventory::list_levels::<S>))
        .route(
            "/inventory/levels/{variant_id}/{location_id}",
            put(routes::inventory::update_level::<S>),
        )
        .route(
            "/inventory/movements",
            get(routes::inventory::list_movements::<S>).post(routes::inventory::record_movement::<S>),
        )
        .route("/inventory/summary", get(routes::inventory::summary::<S>))
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

/// Creates the application state with a simulated payment gateway.
pub fn create_default_state<S: Store>(store: S, config: CommerceConfig) -> Arc<AppState<S>> {
    let gateway = SimulatedGateway::new();

    Arc::new(AppState {
        carts: CartService::new(store.clone(), config.clone()),
        ledger: InventoryLedger::new(store.clone(), config.low_stock_threshold),
        checkout: CheckoutOrchestrator::new(store.clone(), gateway.clone(), config.clone()),
        orders: OrderService::new(store, gateway.clone()),
        gateway,
        config,
    })
}

/// Resolves the default location and builds the application state.
///
/// When no location id is configured, the location named
/// `default_location_name` is found or created.
pub async fn bootstrap<S: Store>(store: S, config: &Config) -> commerce::Result<Arc<AppState<S>>> {
    let location_id = match config.default_location_id {
        Some(id) => id,
        None => {
            let ledger = InventoryLedger::new(store.clone(), config.low_stock_threshold);
            ledger.ensure_location(&config.default_location_name).await?.id
        }
    };

    tracing::info!(location_id = %location_id, "default inventory location resolved");
    Ok(create_default_state(store, config.commerce(location_id)))
}

/// Registers descriptions for the metrics the services emit.
pub fn describe_metrics() {
    metrics::describe_counter!("checkout_attempts_total", "Checkout attempts");
    metrics::describe_counter!("checkout_completed_total", "Checkouts that produced a paid order");
    metrics::describe_counter!("checkout_failed_total", "Failed checkouts by reason");
    metrics::describe_counter!("checkout_refunds_total", "Captures refunded because settlement failed");
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        metrics::Unit::Seconds,
        "Checkout latency"
    );
    metrics::describe_counter!("inventory_movements_total", "Inventory movements by type");
    metrics::describe_counter!("cart_syncs_total", "Cart sync requests");
    metrics::describe_counter!("carts_expired_total", "Carts removed by the expiry sweep");
}

/// Periodically deletes expired carts until the task is aborted.
pub fn spawn_cart_sweeper<S: Store>(state: Arc<AppState<S>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.carts.sweep_expired(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired carts swept"),
                Err(e) => tracing::error!(error = %e, "cart sweep failed"),
            }
        }
    })
}
