//! Records persisted by the store.

use chrono::{DateTime, Utc};
use common::{CategoryId, MenuItemId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// A registered user as seen through the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Membership groups that grant capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    Manager,
    DeliveryCrew,
}

impl Group {
    /// Returns the group name as stored by the identity provider.
    pub fn name(&self) -> &'static str {
        match self {
            Group::Manager => "Manager",
            Group::DeliveryCrew => "Delivery crew",
        }
    }

    /// Looks a group up by its stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Manager" => Some(Group::Manager),
            "Delivery crew" => Some(Group::DeliveryCrew),
            _ => None,
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A menu category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub title: String,
}

impl Category {
    /// Creates a new category with a fresh id.
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            slug: slug.into(),
            title: title.into(),
        }
    }
}

/// An item on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub title: String,
    pub price: Money,
    pub featured: bool,
    pub inventory: u32,
    pub category_id: CategoryId,
}

/// One user's pending quantity of one menu item.
///
/// The title and unit price are copied from the catalog when the line is
/// written; later catalog changes do not reach existing lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub menu_item_id: MenuItemId,
    pub menu_item_title: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    /// Snapshots a menu item into a cart line.
    pub fn snapshot(user_id: UserId, item: &MenuItem, quantity: u32) -> Self {
        Self {
            user_id,
            menu_item_id: item.id,
            menu_item_title: item.title.clone(),
            quantity,
            unit_price: item.price,
        }
    }

    /// Returns unit price times quantity, or `None` if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Opaque order status code.
///
/// Managers and delivery crew may write any non-empty value; no transition
/// table is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(String);

impl OrderStatus {
    const INITIAL: &'static str = "pending";

    /// The status every new order starts with.
    pub fn initial() -> Self {
        Self(Self::INITIAL.to_string())
    }

    /// Creates a status from a caller-supplied code.
    ///
    /// Returns `None` for blank input.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.is_empty() {
            None
        } else {
            Some(Self(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true while the order still carries its initial status.
    pub fn is_initial(&self) -> bool {
        self.0 == Self::INITIAL
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frozen copy of a cart line taken when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub menu_item_title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A placed order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub delivery_crew: Option<UserId>,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Builds an order from a user's cart lines.
    ///
    /// The total is computed once here and never recomputed afterwards.
    /// Fails with `OutOfRange` if a line total or the order total overflows.
    pub fn from_cart(
        user_id: UserId,
        lines: &[CartLine],
        placed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let id = OrderId::new();
        let items = lines
            .iter()
            .map(|line| {
                let line_total = line.line_total().ok_or_else(|| {
                    StoreError::OutOfRange(format!(
                        "line total for menu item {}",
                        line.menu_item_id
                    ))
                })?;
                Ok(OrderItem {
                    order_id: id,
                    menu_item_id: line.menu_item_id,
                    menu_item_title: line.menu_item_title.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let total = Money::checked_sum(items.iter().map(|item| item.line_total))
            .ok_or_else(|| StoreError::OutOfRange("order total".to_string()))?;

        Ok(Self {
            id,
            user_id,
            delivery_crew: None,
            status: OrderStatus::initial(),
            total,
            created_at: placed_at,
            items,
        })
    }
}

/// Changes applied to an order by `OrderStore::update_order`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub delivery_crew: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.delivery_crew.is_none() && self.status.is_none()
    }

    pub(crate) fn apply_to(&self, order: &mut Order) {
        if let Some(crew) = self.delivery_crew {
            order.delivery_crew = Some(crew);
        }
        if let Some(ref status) = self.status {
            order.status = status.clone();
        }
    }
}

/// Which orders `OrderStore::list_orders` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    /// Every order.
    All,
    /// Orders with any delivery crew member assigned.
    Assigned,
    /// Orders placed by the given user.
    OwnedBy(UserId),
}

impl OrderFilter {
    pub(crate) fn matches(&self, order: &Order) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::Assigned => order.delivery_crew.is_some(),
            OrderFilter::OwnedBy(user_id) => order.user_id == *user_id,
        }
    }
}
