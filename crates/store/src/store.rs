use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, MenuItemId, OrderId, UserId};

use crate::identity::IdentityProvider;
use crate::model::{CartLine, Category, MenuItem, Order, OrderFilter, OrderPatch};
use crate::{MenuQuery, Result};

/// Persistence for categories and menu items.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns all categories ordered by title.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Inserts a category.
    ///
    /// Fails with `Conflict` if the slug is already taken.
    async fn insert_category(&self, category: Category) -> Result<()>;

    /// Returns one page of menu items matching the query.
    async fn list_menu_items(&self, query: &MenuQuery) -> Result<Vec<MenuItem>>;

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>>;

    /// Inserts a menu item.
    ///
    /// Fails with `NotFound` if the category does not exist.
    async fn insert_menu_item(&self, item: MenuItem) -> Result<()>;

    /// Replaces a stored menu item.
    ///
    /// Returns false if no item with that id exists.
    async fn update_menu_item(&self, item: MenuItem) -> Result<bool>;

    /// Deletes a menu item together with any cart lines referencing it.
    ///
    /// Order items keep their snapshot. Returns false if nothing was deleted.
    async fn delete_menu_item(&self, id: MenuItemId) -> Result<bool>;
}

/// Persistence for per-user cart lines.
///
/// All writes for a single user are serialized with respect to `checkout`.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Inserts the line, or replaces the quantity and price snapshot of the
    /// existing line for the same `(user, menu item)` pair.
    async fn upsert_cart_line(&self, line: CartLine) -> Result<()>;

    /// Returns all lines in the user's cart.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Removes one line. Returns false if the line did not exist.
    async fn remove_cart_line(&self, user_id: UserId, menu_item_id: MenuItemId) -> Result<bool>;

    /// Removes every line in the user's cart and returns how many were removed.
    async fn clear_cart(&self, user_id: UserId) -> Result<usize>;

    /// Converts the user's cart into an order in one atomic unit.
    ///
    /// Reads the lines, inserts the order built by `Order::from_cart` with all
    /// of its items and deletes the lines. Returns `None` without writing
    /// anything if the cart is empty.
    async fn checkout(&self, user_id: UserId, placed_at: DateTime<Utc>) -> Result<Option<Order>>;
}

/// Persistence for placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns orders matching the filter, newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;

    /// Applies a patch and returns the updated order, or `None` if it does
    /// not exist.
    async fn update_order(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>>;

    /// Deletes an order and its items. Returns false if nothing was deleted.
    async fn delete_order(&self, id: OrderId) -> Result<bool>;
}

/// Everything the services need from one backend.
pub trait Store: CatalogStore + CartStore + OrderStore + IdentityProvider + Clone + 'static {}

impl<T> Store for T where T: CatalogStore + CartStore + OrderStore + IdentityProvider + Clone + 'static {}
