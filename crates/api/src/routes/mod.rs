//! HTTP handlers and the state they share.

pub mod cart;
pub mod categories;
pub mod groups;
pub mod health;
pub mod menu;
pub mod metrics;
pub mod orders;

use domain::{CartService, CatalogService, GroupService, OrderService};
use serde::Serialize;
use store::{Store, User};

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub groups: GroupService<S>,
    pub identity: S,
}

impl<S: Store> AppState<S> {
    /// Builds every service over the same store.
    pub fn new(store: S) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            groups: GroupService::new(store.clone()),
            identity: store,
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: user.email,
        }
    }
}
