//! Menu item endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CategoryId, MenuItemId, Money};
use domain::{MenuItemChanges, NewMenuItem};
use serde::{Deserialize, Serialize};
use store::{MAX_PER_PAGE, MenuItem, MenuOrdering, MenuQuery, Store};

use crate::auth::CurrentUser;
use crate::error::{ApiError, parse_id};
use crate::routes::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct MenuItemsParams {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<usize>,
    pub perpage: Option<usize>,
}

impl MenuItemsParams {
    fn into_query(self) -> Result<MenuQuery, ApiError> {
        let mut query = MenuQuery::new();

        if let Some(ref raw) = self.category {
            query = query.category(parse_id::<CategoryId>("category", raw)?);
        }
        if let Some(featured) = self.featured {
            query = query.featured(featured);
        }
        if let Some(term) = self.search {
            query = query.search(term);
        }
        if let Some(ref raw) = self.ordering {
            let ordering = MenuOrdering::parse(raw).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Invalid ordering '{raw}': expected price, -price, inventory or -inventory"
                ))
            })?;
            query = query.ordering(ordering);
        }

        let page = self.page.unwrap_or(1);
        let per_page = self.perpage.unwrap_or(query.per_page);
        if page < 1 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::BadRequest(format!(
                "perpage must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(query.page(page, per_page))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMenuItemRequest {
    pub title: String,
    pub price_cents: i64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub inventory: i64,
    pub category_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub title: Option<String>,
    pub price_cents: Option<i64>,
    pub featured: Option<bool>,
    pub inventory: Option<i64>,
    pub category_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct MenuItemResponse {
    pub id: String,
    pub title: String,
    pub price: String,
    pub price_cents: i64,
    pub featured: bool,
    pub inventory: u32,
    pub category_id: String,
}

impl From<MenuItem> for MenuItemResponse {
    fn from(item: MenuItem) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title,
            price: item.price.to_string(),
            price_cents: item.price.cents(),
            featured: item.featured,
            inventory: item.inventory,
            category_id: item.category_id.to_string(),
        }
    }
}

// -- Handlers --

/// GET /api/menu-items: filter, search, order and paginate the menu.
#[tracing::instrument(skip(state, _user))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<MenuItemsParams>,
) -> Result<Json<Vec<MenuItemResponse>>, ApiError> {
    let query = params.into_query()?;
    let items = state.catalog.list_menu_items(&query).await?;
    Ok(Json(items.into_iter().map(MenuItemResponse::from).collect()))
}

/// POST /api/menu-items, managers only.
#[tracing::instrument(skip(state, user, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateMenuItemRequest>,
) -> Result<(StatusCode, Json<MenuItemResponse>), ApiError> {
    let new_item = NewMenuItem {
        title: req.title,
        price: Money::from_cents(req.price_cents),
        featured: req.featured,
        inventory: req.inventory,
        category_id: parse_id("category_id", &req.category_id)?,
    };
    let item = state.catalog.create_menu_item(&user, new_item).await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// GET /api/menu-items/{id}
#[tracing::instrument(skip(state, _user))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let id: MenuItemId = parse_id("menu item id", &id)?;
    let item = state.catalog.get_menu_item(id).await?;
    Ok(Json(item.into()))
}

/// PUT /api/menu-items/{id}: replaces every field, managers only.
#[tracing::instrument(skip(state, user, req))]
pub async fn replace<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CreateMenuItemRequest>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let id: MenuItemId = parse_id("menu item id", &id)?;
    let changes = MenuItemChanges {
        title: Some(req.title),
        price: Some(Money::from_cents(req.price_cents)),
        featured: Some(req.featured),
        inventory: Some(req.inventory),
        category_id: Some(parse_id("category_id", &req.category_id)?),
    };
    let item = state.catalog.update_menu_item(&user, id, changes).await?;
    Ok(Json(item.into()))
}

/// PATCH /api/menu-items/{id}: changes only the fields sent, managers only.
#[tracing::instrument(skip(state, user, req))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateMenuItemRequest>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let id: MenuItemId = parse_id("menu item id", &id)?;
    let category_id = match req.category_id {
        Some(ref raw) => Some(parse_id("category_id", raw)?),
        None => None,
    };
    let changes = MenuItemChanges {
        title: req.title,
        price: req.price_cents.map(Money::from_cents),
        featured: req.featured,
        inventory: req.inventory,
        category_id,
    };
    let item = state.catalog.update_menu_item(&user, id, changes).await?;
    Ok(Json(item.into()))
}

/// DELETE /api/menu-items/{id}, managers only.
#[tracing::instrument(skip(state, user))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: MenuItemId = parse_id("menu item id", &id)?;
    state.catalog.delete_menu_item(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
