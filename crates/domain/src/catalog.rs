//! Menu catalog: categories and menu items.

use common::{CategoryId, MenuItemId, Money};
use store::{Category, MenuItem, MenuQuery, Store, User};

use crate::access::{AccessPolicy, Capability};
use crate::error::DomainError;

/// Fields for a new menu item.
#[derive(Debug, Clone)]
pub struct NewMenuItem {
    pub title: String,
    pub price: Money,
    pub featured: bool,
    pub inventory: i64,
    pub category_id: CategoryId,
}

/// Partial update of a menu item. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct MenuItemChanges {
    pub title: Option<String>,
    pub price: Option<Money>,
    pub featured: Option<bool>,
    pub inventory: Option<i64>,
    pub category_id: Option<CategoryId>,
}

/// Service for browsing and maintaining the menu.
///
/// Reads are open to any authenticated caller; writes need the Manager
/// capability.
pub struct CatalogService<S: Store> {
    store: S,
    policy: AccessPolicy<S>,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            policy: AccessPolicy::new(store.clone()),
            store,
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        Ok(self.store.list_categories().await?)
    }

    /// Creates a category. Fails with `InvalidState` if the slug is taken.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_category(
        &self,
        actor: &User,
        slug: &str,
        title: &str,
    ) -> Result<Category, DomainError> {
        self.policy.require(actor, Capability::Manager).await?;

        let category = Category::new(non_blank("slug", slug)?, non_blank("title", title)?);
        self.store.insert_category(category.clone()).await?;

        tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    /// Returns one page of menu items.
    #[tracing::instrument(skip(self))]
    pub async fn list_menu_items(&self, query: &MenuQuery) -> Result<Vec<MenuItem>, DomainError> {
        Ok(self.store.list_menu_items(query).await?)
    }

    pub async fn get_menu_item(&self, id: MenuItemId) -> Result<MenuItem, DomainError> {
        self.store
            .get_menu_item(id)
            .await?
            .ok_or_else(|| DomainError::not_found("menu item", id))
    }

    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_menu_item(
        &self,
        actor: &User,
        new_item: NewMenuItem,
    ) -> Result<MenuItem, DomainError> {
        self.policy.require(actor, Capability::Manager).await?;

        let item = MenuItem {
            id: MenuItemId::new(),
            title: non_blank("title", &new_item.title)?,
            price: positive_price(new_item.price)?,
            featured: new_item.featured,
            inventory: inventory(new_item.inventory)?,
            category_id: new_item.category_id,
        };
        self.store.insert_menu_item(item.clone()).await?;

        tracing::info!(menu_item_id = %item.id, price = %item.price, "menu item created");
        Ok(item)
    }

    /// Applies changes to a menu item.
    ///
    /// Cart lines and orders keep the price they were created with.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_menu_item(
        &self,
        actor: &User,
        id: MenuItemId,
        changes: MenuItemChanges,
    ) -> Result<MenuItem, DomainError> {
        self.policy.require(actor, Capability::Manager).await?;

        let mut item = self.get_menu_item(id).await?;
        if let Some(title) = changes.title {
            item.title = non_blank("title", &title)?;
        }
        if let Some(price) = changes.price {
            item.price = positive_price(price)?;
        }
        if let Some(featured) = changes.featured {
            item.featured = featured;
        }
        if let Some(count) = changes.inventory {
            item.inventory = inventory(count)?;
        }
        if let Some(category_id) = changes.category_id {
            item.category_id = category_id;
        }

        if !self.store.update_menu_item(item.clone()).await? {
            return Err(DomainError::not_found("menu item", id));
        }
        Ok(item)
    }

    /// Deletes a menu item. Cart lines for it go too; order items stay.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_menu_item(&self, actor: &User, id: MenuItemId) -> Result<(), DomainError> {
        self.policy.require(actor, Capability::Manager).await?;

        if self.store.delete_menu_item(id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("menu item", id))
        }
    }
}

fn non_blank(field: &str, value: &str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::InvalidArgument(format!(
            "{field} must not be blank"
        )));
    }
    Ok(value.to_string())
}

fn positive_price(price: Money) -> Result<Money, DomainError> {
    if !price.is_positive() {
        Err(DomainError::InvalidArgument(format!(
            "price must be greater than zero, got {price}"
        )))
    } else if price > Money::MAX_PRICE {
        Err(DomainError::InvalidArgument(format!(
            "price must be at most {}, got {price}",
            Money::MAX_PRICE
        )))
    } else {
        Ok(price)
    }
}

fn inventory(count: i64) -> Result<u32, DomainError> {
    u32::try_from(count)
        .ok()
        .filter(|&count| i32::try_from(count).is_ok())
        .ok_or_else(|| {
            DomainError::InvalidArgument(format!("inventory {count} is out of range"))
        })
}
