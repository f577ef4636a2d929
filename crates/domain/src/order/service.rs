//! Order service: cart checkout and the role-gated order workflow.

use chrono::Utc;
use common::{OrderId, UserId};
use store::{Group, Order, OrderFilter, OrderItem, OrderPatch, OrderStatus, Store, User};

use crate::access::{AccessPolicy, Capability};
use crate::error::DomainError;

use super::OrderStage;

/// Requested changes to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderChanges {
    pub delivery_crew: Option<UserId>,
    pub status: Option<String>,
}

/// What `OrderService::update_order` hands back, depending on who asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderUpdate {
    /// A manager update returns the order's items.
    Items(Vec<OrderItem>),
    /// A delivery crew update returns a confirmation of the new status.
    StatusUpdated {
        order_id: OrderId,
        status: OrderStatus,
    },
}

/// Service for managing orders.
pub struct OrderService<S: Store> {
    store: S,
    policy: AccessPolicy<S>,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            policy: AccessPolicy::new(store.clone()),
            store,
        }
    }

    /// Turns the user's cart into an order.
    ///
    /// The order, its items and the emptied cart are written as one unit by
    /// the store. Fails with `InvalidState` if the cart is empty.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_order(&self, user: &User) -> Result<Order, DomainError> {
        let order = self
            .store
            .checkout(user.id, Utc::now())
            .await?
            .ok_or_else(|| DomainError::InvalidState("cart is empty".to_string()))?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            items = order.items.len(),
            total = %order.total,
            "order created"
        );
        Ok(order)
    }

    /// Lists the orders the user may see.
    ///
    /// Managers see everything, delivery crew see every order that has any
    /// crew member assigned, everyone else sees their own orders.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn list_orders_visible_to(&self, user: &User) -> Result<Vec<Order>, DomainError> {
        let filter = if self.policy.has_capability(user, Capability::Manager).await? {
            OrderFilter::All
        } else if self
            .policy
            .has_capability(user, Capability::DeliveryCrew)
            .await?
        {
            OrderFilter::Assigned
        } else {
            OrderFilter::OwnedBy(user.id)
        };

        Ok(self.store.list_orders(filter).await?)
    }

    /// Loads an order visible to the actor.
    ///
    /// Returns `NotFound` both when the order is absent and when the actor
    /// is neither a manager nor the owner.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn get_order(&self, actor: &User, order_id: OrderId) -> Result<Order, DomainError> {
        let order = self.load(order_id).await?;
        if order.user_id == actor.id
            || self.policy.has_capability(actor, Capability::Manager).await?
        {
            Ok(order)
        } else {
            Err(DomainError::not_found("order", order_id))
        }
    }

    /// Returns the items of an order visible to the actor.
    pub async fn list_items(
        &self,
        actor: &User,
        order_id: OrderId,
    ) -> Result<Vec<OrderItem>, DomainError> {
        Ok(self.get_order(actor, order_id).await?.items)
    }

    /// Applies a manager or delivery crew update.
    ///
    /// Managers may assign a delivery crew member and set the status.
    /// Delivery crew may only set the status; any crew field they send is
    /// ignored. Nothing is written when the update is rejected.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_order(
        &self,
        actor: &User,
        order_id: OrderId,
        changes: OrderChanges,
    ) -> Result<OrderUpdate, DomainError> {
        let order = self.load(order_id).await?;

        let is_manager = self.policy.has_capability(actor, Capability::Manager).await?;
        if !is_manager
            && !self
                .policy
                .has_capability(actor, Capability::DeliveryCrew)
                .await?
        {
            return Err(DomainError::Forbidden(
                "only managers and delivery crew may update orders".to_string(),
            ));
        }

        let status = match changes.status {
            Some(ref code) => Some(OrderStatus::parse(code).ok_or_else(|| {
                DomainError::InvalidArgument("status must not be blank".to_string())
            })?),
            None => None,
        };

        if is_manager {
            if let Some(crew_id) = changes.delivery_crew {
                self.check_crew_member(crew_id).await?;
            }
            let patch = OrderPatch {
                delivery_crew: changes.delivery_crew,
                status,
            };
            let updated = self.apply(order, patch).await?;
            return Ok(OrderUpdate::Items(updated.items));
        }

        // Delivery crew: status only
        let Some(status) = status else {
            return Err(DomainError::InvalidArgument(
                "status is required".to_string(),
            ));
        };
        let patch = OrderPatch {
            delivery_crew: None,
            status: Some(status),
        };
        let updated = self.apply(order, patch).await?;
        Ok(OrderUpdate::StatusUpdated {
            order_id: updated.id,
            status: updated.status,
        })
    }

    /// Deletes an order and its items.
    ///
    /// The owner of an order may not delete it, even when they are a
    /// manager. Everyone else needs the Manager capability.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_order(&self, actor: &User, order_id: OrderId) -> Result<(), DomainError> {
        let order = self.load(order_id).await?;

        if order.user_id == actor.id {
            return Err(DomainError::Forbidden(
                "an order cannot be deleted by the user who placed it".to_string(),
            ));
        }
        self.policy.require(actor, Capability::Manager).await?;

        if !self.store.delete_order(order_id).await? {
            return Err(DomainError::not_found("order", order_id));
        }

        metrics::counter!("orders_deleted_total").increment(1);
        tracing::info!(
            %order_id,
            from = %OrderStage::of(&order),
            to = %OrderStage::Deleted,
            "order deleted"
        );
        Ok(())
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))
    }

    async fn check_crew_member(&self, user_id: UserId) -> Result<(), DomainError> {
        let crew = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;

        if self.store.has_group(crew.id, Group::DeliveryCrew).await? {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "{} is not in the {} group",
                crew.username,
                Group::DeliveryCrew
            )))
        }
    }

    async fn apply(&self, before: Order, patch: OrderPatch) -> Result<Order, DomainError> {
        if patch.is_empty() {
            return Ok(before);
        }

        let updated = self
            .store
            .update_order(before.id, patch)
            .await?
            .ok_or_else(|| DomainError::not_found("order", before.id))?;

        metrics::counter!("order_updates_total").increment(1);
        tracing::info!(
            order_id = %updated.id,
            from = %OrderStage::of(&before),
            to = %OrderStage::of(&updated),
            status = %updated.status,
            "order updated"
        );
        Ok(updated)
    }
}
