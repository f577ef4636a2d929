//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use domain::{OrderChanges, OrderStage, OrderUpdate};
use serde::{Deserialize, Serialize};
use store::{Order, OrderItem, Store};

use crate::auth::CurrentUser;
use crate::error::{ApiError, parse_id};
use crate::routes::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub delivery_crew: Option<String>,
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub delivery_crew: Option<String>,
    pub status: String,
    pub stage: String,
    pub total: String,
    pub total_cents: i64,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            stage: OrderStage::of(&order).to_string(),
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            delivery_crew: order.delivery_crew.map(|id| id.to_string()),
            status: order.status.to_string(),
            total: order.total.to_string(),
            total_cents: order.total.cents(),
            created_at: order.created_at.to_rfc3339(),
            items: order.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub menu_item_id: String,
    pub menu_item_title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            menu_item_id: item.menu_item_id.to_string(),
            menu_item_title: item.menu_item_title,
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total.cents(),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum UpdateOrderResponse {
    Items(Vec<OrderItemResponse>),
    StatusUpdated {
        order_id: String,
        status: String,
        message: String,
    },
}

impl From<OrderUpdate> for UpdateOrderResponse {
    fn from(update: OrderUpdate) -> Self {
        match update {
            OrderUpdate::Items(items) => {
                UpdateOrderResponse::Items(items.into_iter().map(Into::into).collect())
            }
            OrderUpdate::StatusUpdated { order_id, status } => UpdateOrderResponse::StatusUpdated {
                message: format!("Order {order_id} status updated to {status}"),
                order_id: order_id.to_string(),
                status: status.to_string(),
            },
        }
    }
}

// -- Handlers --

/// GET /api/orders: the orders visible to the caller.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders_visible_to(&user).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// POST /api/orders: place an order from the caller's cart.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orders.create_order(&user).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/{id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let order = state.orders.get_order(&user, order_id).await?;
    Ok(Json(order.into()))
}

/// GET /api/orders/{id}/items
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn items<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderItemResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let items = state.orders.list_items(&user, order_id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// PUT or PATCH /api/orders/{id}: crew assignment and status changes.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<UpdateOrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let delivery_crew = match req.delivery_crew {
        Some(ref raw) => Some(parse_id::<UserId>("delivery_crew", raw)?),
        None => None,
    };
    let changes = OrderChanges {
        delivery_crew,
        status: req.status,
    };

    let update = state.orders.update_order(&user, order_id, changes).await?;
    Ok(Json(update.into()))
}

/// DELETE /api/orders/{id}, managers only.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    state.orders.delete_order(&user, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
