//! Per-user shopping carts.

use common::{MenuItemId, Money};
use store::{CartLine, Store, User};

use crate::error::DomainError;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i64 = i32::MAX as i64;

/// A cart line together with its computed total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub line: CartLine,
    pub line_total: Money,
}

/// Everything in a user's cart, priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartContents {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Service for the authenticated user's own cart.
///
/// Every method is scoped to the `User` passed in; there is no way to reach
/// another user's cart through this service.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Puts a menu item in the cart, replacing the quantity if it is already
    /// there.
    ///
    /// The unit price is read from the catalog now and kept on the line.
    /// Nothing is stored if the line or cart total would overflow.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn add_or_update_line(
        &self,
        user: &User,
        menu_item_id: MenuItemId,
        quantity: i64,
    ) -> Result<PricedLine, DomainError> {
        if quantity < 1 {
            return Err(DomainError::InvalidArgument(format!(
                "quantity must be at least 1, got {quantity}"
            )));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::InvalidArgument(format!(
                "quantity must be at most {MAX_LINE_QUANTITY}, got {quantity}"
            )));
        }
        let quantity = u32::try_from(quantity).map_err(|_| {
            DomainError::InvalidArgument(format!("quantity {quantity} is too large"))
        })?;

        let item = self
            .store
            .get_menu_item(menu_item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("menu item", menu_item_id))?;

        let priced = price(CartLine::snapshot(user.id, &item, quantity))?;

        let others = self.store.cart_lines(user.id).await?;
        let mut totals = vec![priced.line_total];
        for line in others.iter().filter(|line| line.menu_item_id != menu_item_id) {
            totals.push(price(line.clone())?.line_total);
        }
        if Money::checked_sum(totals).is_none() {
            return Err(DomainError::InvalidArgument(
                "cart total is out of range".to_string(),
            ));
        }

        self.store.upsert_cart_line(priced.line.clone()).await?;

        metrics::counter!("cart_lines_upserted_total").increment(1);
        tracing::debug!(%menu_item_id, quantity, "cart line upserted");
        Ok(priced)
    }

    /// Returns the lines in the user's cart.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn list_lines(&self, user: &User) -> Result<Vec<CartLine>, DomainError> {
        Ok(self.store.cart_lines(user.id).await?)
    }

    /// Removes one menu item from the cart.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn remove_line(
        &self,
        user: &User,
        menu_item_id: MenuItemId,
    ) -> Result<(), DomainError> {
        if self.store.remove_cart_line(user.id, menu_item_id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("cart line for menu item", menu_item_id))
        }
    }

    /// Empties the cart. Clearing an empty cart succeeds.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn clear_cart(&self, user: &User) -> Result<(), DomainError> {
        let removed = self.store.clear_cart(user.id).await?;
        tracing::debug!(removed, "cart cleared");
        Ok(())
    }

    /// Returns the cart's lines with their line totals and the cart total,
    /// all from one read.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn cart_contents(&self, user: &User) -> Result<CartContents, DomainError> {
        let lines = self
            .store
            .cart_lines(user.id)
            .await?
            .into_iter()
            .map(price)
            .collect::<Result<Vec<_>, _>>()?;
        let total = Money::checked_sum(lines.iter().map(|priced| priced.line_total))
            .ok_or_else(|| {
                DomainError::InvalidArgument("cart total is out of range".to_string())
            })?;
        Ok(CartContents { lines, total })
    }
}

fn price(line: CartLine) -> Result<PricedLine, DomainError> {
    let line_total = line.line_total().ok_or_else(|| {
        DomainError::InvalidArgument(format!(
            "line total for menu item {} is out of range",
            line.menu_item_id
        ))
    })?;
    Ok(PricedLine { line, line_total })
}
