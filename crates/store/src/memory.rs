use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, MenuItemId, OrderId, UserId};
use tokio::sync::RwLock;

use crate::{
    IdentityProvider, MenuQuery, Result, StoreError,
    model::{CartLine, Category, Group, MenuItem, Order, OrderFilter, OrderPatch, User},
    store::{CartStore, CatalogStore, OrderStore},
};

#[derive(Debug, Default)]
struct InMemoryState {
    categories: HashMap<CategoryId, Category>,
    menu_items: HashMap<MenuItemId, MenuItem>,
    carts: HashMap<UserId, Vec<CartLine>>,
    orders: HashMap<OrderId, Order>,
    users: HashMap<UserId, User>,
    groups: HashMap<Group, HashSet<UserId>>,
    tokens: HashMap<String, UserId>,
}

/// In-memory store implementation for testing and single-node runs.
///
/// All state sits behind a single lock, so every trait method is atomic
/// with respect to every other, including `checkout`.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all data, including users and tokens.
    pub async fn clear(&self) {
        *self.state.write().await = InMemoryState::default();
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn insert_category(&self, category: Category) -> Result<()> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.slug == category.slug) {
            return Err(StoreError::Conflict(format!(
                "category slug '{}' already exists",
                category.slug
            )));
        }
        state.categories.insert(category.id, category);
        Ok(())
    }

    async fn list_menu_items(&self, query: &MenuQuery) -> Result<Vec<MenuItem>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .menu_items
            .values()
            .filter(|item| query.matches(item, state.categories.get(&item.category_id)))
            .cloned()
            .collect();

        query.sort(&mut items);

        Ok(items
            .into_iter()
            .skip(query.offset())
            .take(query.per_page)
            .collect())
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>> {
        Ok(self.state.read().await.menu_items.get(&id).cloned())
    }

    async fn insert_menu_item(&self, item: MenuItem) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&item.category_id) {
            return Err(StoreError::not_found("Category", item.category_id));
        }
        state.menu_items.insert(item.id, item);
        Ok(())
    }

    async fn update_menu_item(&self, item: MenuItem) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&item.category_id) {
            return Err(StoreError::not_found("Category", item.category_id));
        }
        match state.menu_items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.menu_items.remove(&id).is_none() {
            return Ok(false);
        }
        for lines in state.carts.values_mut() {
            lines.retain(|line| line.menu_item_id != id);
        }
        Ok(true)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn upsert_cart_line(&self, line: CartLine) -> Result<()> {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(line.user_id).or_default();

        match lines
            .iter_mut()
            .find(|existing| existing.menu_item_id == line.menu_item_id)
        {
            Some(existing) => *existing = line,
            None => lines.push(line),
        }
        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn remove_cart_line(&self, user_id: UserId, menu_item_id: MenuItemId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(lines) = state.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|line| line.menu_item_id != menu_item_id);
        Ok(lines.len() < before)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<usize> {
        let mut state = self.state.write().await;
        Ok(state.carts.remove(&user_id).map_or(0, |lines| lines.len()))
    }

    async fn checkout(&self, user_id: UserId, placed_at: DateTime<Utc>) -> Result<Option<Order>> {
        let mut state = self.state.write().await;

        let lines = match state.carts.get(&user_id) {
            Some(lines) if !lines.is_empty() => lines,
            _ => return Ok(None),
        };

        let order = Order::from_cart(user_id, lines, placed_at)?;
        state.orders.insert(order.id, order.clone());
        state.carts.remove(&user_id);

        Ok(Some(order))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn update_order(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        Ok(state.orders.get_mut(&id).map(|order| {
            patch.apply_to(order);
            order.clone()
        }))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        Ok(self.state.write().await.orders.remove(&id).is_some())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryStore {
    async fn authenticate(&self, token: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .tokens
            .get(token)
            .and_then(|user_id| state.users.get(user_id))
            .cloned())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn has_group(&self, user_id: UserId, group: Group) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .get(&group)
            .is_some_and(|members| members.contains(&user_id)))
    }

    async fn group_members(&self, group: Group) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut members: Vec<_> = state
            .groups
            .get(&group)
            .into_iter()
            .flatten()
            .filter_map(|id| state.users.get(id))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(members)
    }

    async fn add_to_group(&self, user_id: UserId, group: Group) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        state.groups.entry(group).or_default().insert(user_id);
        Ok(())
    }

    async fn remove_from_group(&self, user_id: UserId, group: Group) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(members) = state.groups.get_mut(&group) {
            members.remove(&user_id);
        }
        Ok(())
    }

    async fn register_user(&self, username: &str, email: &str) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|user| user.username == username) {
            return Err(StoreError::Conflict(format!(
                "username '{username}' already exists"
            )));
        }
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email: email.to_string(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn issue_token(&self, user_id: UserId, token: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        state.tokens.insert(token.to_string(), user_id);
        Ok(())
    }
}
