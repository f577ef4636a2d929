//! HTTP API server for the restaurant ordering service.
//!
//! Exposes the menu, cart, order and group endpoints under `/api`, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{Group, Store, StoreError, User};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    use routes::{cart, categories, groups, menu, orders};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route(
            "/menu-items",
            get(menu::list::<S>).post(menu::create::<S>),
        )
        .route(
            "/menu-items/{id}",
            get(menu::get::<S>)
                .put(menu::replace::<S>)
                .patch(menu::update::<S>)
                .delete(menu::delete::<S>),
        )
        .route(
            "/categories",
            get(categories::list::<S>).post(categories::create::<S>),
        )
        .route(
            "/cart/menu-items",
            get(cart::list::<S>)
                .post(cart::add::<S>)
                .delete(cart::clear::<S>),
        )
        .route(
            "/cart/menu-items/{menu_item_id}",
            delete(cart::remove::<S>),
        )
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>)
                .put(orders::update::<S>)
                .patch(orders::update::<S>)
                .delete(orders::delete::<S>),
        )
        .route("/orders/{id}/items", get(orders::items::<S>))
        .route(
            "/groups/{group}/users",
            get(groups::list::<S>).post(groups::add::<S>),
        )
        .route("/groups/{group}/users/{id}", delete(groups::remove::<S>));

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

/// Creates the application state with every service over one store.
pub fn create_default_state<S: Store>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store))
}

/// Makes sure a manager account exists and can log in with `token`.
///
/// Registers the user if needed; running it again with the same values
/// changes nothing.
#[tracing::instrument(skip(store, token))]
pub async fn bootstrap_manager<S: Store>(
    store: &S,
    username: &str,
    token: &str,
) -> Result<User, StoreError> {
    let user = match store.find_user_by_username(username).await? {
        Some(user) => user,
        None => {
            store
                .register_user(username, &format!("{username}@localhost"))
                .await?
        }
    };

    store.add_to_group(user.id, Group::Manager).await?;
    store.issue_token(user.id, token).await?;

    tracing::info!(user_id = %user.id, "bootstrap manager ready");
    Ok(user)
}
