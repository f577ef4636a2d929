//! Cart endpoints. Every handler works on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::MenuItemId;
use domain::PricedLine;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::CurrentUser;
use crate::error::{ApiError, parse_id};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub menu_item_id: String,
    pub quantity: i64,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub menu_item_id: String,
    pub menu_item_title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<PricedLine> for CartLineResponse {
    fn from(PricedLine { line, line_total }: PricedLine) -> Self {
        Self {
            line_total_cents: line_total.cents(),
            menu_item_id: line.menu_item_id.to_string(),
            menu_item_title: line.menu_item_title,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub total: String,
    pub total_cents: i64,
}

/// GET /api/cart/menu-items
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let contents = state.carts.cart_contents(&user).await?;

    Ok(Json(CartResponse {
        items: contents.lines.into_iter().map(Into::into).collect(),
        total: contents.total.to_string(),
        total_cents: contents.total.cents(),
    }))
}

/// POST /api/cart/menu-items: add a line, or replace its quantity.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLineResponse>), ApiError> {
    let menu_item_id: MenuItemId = parse_id("menu_item_id", &req.menu_item_id)?;
    let line = state
        .carts
        .add_or_update_line(&user, menu_item_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line.into())))
}

/// DELETE /api/cart/menu-items: empty the cart.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.carts.clear_cart(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/cart/menu-items/{menu_item_id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(menu_item_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let menu_item_id: MenuItemId = parse_id("menu_item_id", &menu_item_id)?;
    state.carts.remove_line(&user, menu_item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
