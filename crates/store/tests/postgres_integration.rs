//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{MenuItemId, Money};
use sqlx::PgPool;
use store::{
    CartLine, CartStore, CatalogStore, Category, Group, IdentityProvider, MenuItem, MenuOrdering,
    MenuQuery, OrderFilter, OrderPatch, OrderStatus, OrderStore, PostgresStore, StoreError, User,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_restaurant_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and emptied tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_lines, menu_items, categories, \
         auth_tokens, user_groups, users CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_category(store: &PostgresStore, slug: &str, title: &str) -> Category {
    let category = Category::new(slug, title);
    store.insert_category(category.clone()).await.unwrap();
    category
}

async fn seed_item(
    store: &PostgresStore,
    category: &Category,
    title: &str,
    cents: i64,
    inventory: u32,
) -> MenuItem {
    let item = MenuItem {
        id: MenuItemId::new(),
        title: title.to_string(),
        price: Money::from_cents(cents),
        featured: false,
        inventory,
        category_id: category.id,
    };
    store.insert_menu_item(item.clone()).await.unwrap();
    item
}

async fn seed_user(store: &PostgresStore, username: &str) -> User {
    store
        .register_user(username, &format!("{username}@example.com"))
        .await
        .unwrap()
}

#[tokio::test]
async fn category_slug_is_unique() {
    let store = get_test_store().await;
    seed_category(&store, "mains", "Mains").await;

    let result = store.insert_category(Category::new("mains", "Other")).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
    assert_eq!(store.list_categories().await.unwrap().len(), 1);
}

#[tokio::test]
async fn menu_item_requires_existing_category() {
    let store = get_test_store().await;
    let orphan = Category::new("ghost", "Ghost");

    let item = MenuItem {
        id: MenuItemId::new(),
        title: "Soup".to_string(),
        price: Money::from_cents(500),
        featured: false,
        inventory: 1,
        category_id: orphan.id,
    };
    let result = store.insert_menu_item(item).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn list_menu_items_filters_searches_and_orders() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let desserts = seed_category(&store, "desserts", "Desserts").await;

    seed_item(&store, &mains, "Lasagna", 1500, 3).await;
    seed_item(&store, &mains, "Burger", 1200, 10).await;
    seed_item(&store, &desserts, "Tiramisu", 700, 5).await;

    let by_category = store
        .list_menu_items(&MenuQuery::new().category(mains.id))
        .await
        .unwrap();
    let titles: Vec<_> = by_category.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Burger", "Lasagna"]);

    // Search matches category titles too
    let search = store
        .list_menu_items(&MenuQuery::new().search("dessert"))
        .await
        .unwrap();
    assert_eq!(search.len(), 1);
    assert_eq!(search[0].title, "Tiramisu");

    let by_price = store
        .list_menu_items(&MenuQuery::new().ordering(MenuOrdering::PriceDesc))
        .await
        .unwrap();
    let prices: Vec<_> = by_price.iter().map(|i| i.price.cents()).collect();
    assert_eq!(prices, vec![1500, 1200, 700]);

    let page = store
        .list_menu_items(&MenuQuery::new().page(2, 2))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].title, "Tiramisu");

    let past_the_end = store
        .list_menu_items(&MenuQuery::new().page(usize::MAX, 100))
        .await
        .unwrap();
    assert!(past_the_end.is_empty());
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    seed_item(&store, &mains, "Burger", 1200, 10).await;

    let result = store
        .list_menu_items(&MenuQuery::new().search("%"))
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn upsert_replaces_quantity_and_snapshot() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let alice = seed_user(&store, "alice").await;

    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 2))
        .await
        .unwrap();
    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 5))
        .await
        .unwrap();

    let lines = store.cart_lines(alice.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 5);
    assert_eq!(lines[0].line_total(), Some(Money::from_cents(6000)));
}

#[tokio::test]
async fn quantity_beyond_column_range_is_out_of_range() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let alice = seed_user(&store, "alice").await;

    let result = store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 3_000_000_000))
        .await;
    assert!(matches!(result, Err(StoreError::OutOfRange(_))));
    assert!(store.cart_lines(alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_moves_cart_into_order() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let lasagna = seed_item(&store, &mains, "Lasagna", 1550, 3).await;
    let alice = seed_user(&store, "alice").await;

    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 2))
        .await
        .unwrap();
    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &lasagna, 1))
        .await
        .unwrap();

    let order = store.checkout(alice.id, Utc::now()).await.unwrap().unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total, Money::from_cents(3950));
    assert!(order.status.is_initial());
    assert!(store.cart_lines(alice.id).await.unwrap().is_empty());

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.total, order.total);
    assert_eq!(stored.items.len(), 2);
    let item_sum = Money::checked_sum(stored.items.iter().map(|i| i.line_total));
    assert_eq!(item_sum, Some(stored.total));
}

#[tokio::test]
async fn checkout_of_empty_cart_writes_nothing() {
    let store = get_test_store().await;
    let alice = seed_user(&store, "alice").await;

    let result = store.checkout(alice.id, Utc::now()).await.unwrap();
    assert!(result.is_none());
    assert!(
        store
            .list_orders(OrderFilter::All)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn order_items_survive_menu_item_deletion() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let alice = seed_user(&store, "alice").await;
    let bob = seed_user(&store, "bob").await;

    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 1))
        .await
        .unwrap();
    let order = store.checkout(alice.id, Utc::now()).await.unwrap().unwrap();

    store
        .upsert_cart_line(CartLine::snapshot(bob.id, &burger, 1))
        .await
        .unwrap();
    assert!(store.delete_menu_item(burger.id).await.unwrap());

    assert!(store.cart_lines(bob.id).await.unwrap().is_empty());
    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.items[0].menu_item_title, "Burger");
}

#[tokio::test]
async fn concurrent_upsert_and_checkout_lose_nothing() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let fries = seed_item(&store, &mains, "Fries", 400, 10).await;
    let alice = seed_user(&store, "alice").await;

    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 1))
        .await
        .unwrap();

    let upsert = store.upsert_cart_line(CartLine::snapshot(alice.id, &fries, 1));
    let checkout = store.checkout(alice.id, Utc::now());
    let (upserted, order) = tokio::join!(upsert, checkout);
    upserted.unwrap();
    let order = order.unwrap().unwrap();

    // Fries either made it into the order or are still in the cart, never both
    let in_order = order.items.iter().any(|i| i.menu_item_id == fries.id);
    let in_cart = store
        .cart_lines(alice.id)
        .await
        .unwrap()
        .iter()
        .any(|l| l.menu_item_id == fries.id);
    assert!(in_order ^ in_cart);
}

#[tokio::test]
async fn update_order_applies_patch_fields() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let alice = seed_user(&store, "alice").await;
    let crew = seed_user(&store, "crew").await;

    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 1))
        .await
        .unwrap();
    let order = store.checkout(alice.id, Utc::now()).await.unwrap().unwrap();

    let patch = OrderPatch {
        delivery_crew: Some(crew.id),
        status: None,
    };
    let updated = store.update_order(order.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.delivery_crew, Some(crew.id));
    assert!(updated.status.is_initial());

    let patch = OrderPatch {
        delivery_crew: None,
        status: OrderStatus::parse("delivered"),
    };
    let updated = store.update_order(order.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.delivery_crew, Some(crew.id));
    assert_eq!(updated.status.as_str(), "delivered");
    assert_eq!(updated.items.len(), 1);

    let assigned = store.list_orders(OrderFilter::Assigned).await.unwrap();
    assert_eq!(assigned.len(), 1);
}

#[tokio::test]
async fn update_and_delete_missing_order() {
    let store = get_test_store().await;
    let missing = common::OrderId::new();

    let patch = OrderPatch {
        delivery_crew: None,
        status: OrderStatus::parse("done"),
    };
    assert!(store.update_order(missing, patch).await.unwrap().is_none());
    assert!(!store.delete_order(missing).await.unwrap());
}

#[tokio::test]
async fn list_orders_by_owner_newest_first() {
    let store = get_test_store().await;
    let mains = seed_category(&store, "mains", "Mains").await;
    let burger = seed_item(&store, &mains, "Burger", 1200, 10).await;
    let alice = seed_user(&store, "alice").await;
    let bob = seed_user(&store, "bob").await;

    let earlier = Utc::now() - chrono::Duration::minutes(5);
    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 1))
        .await
        .unwrap();
    let first = store.checkout(alice.id, earlier).await.unwrap().unwrap();
    store
        .upsert_cart_line(CartLine::snapshot(alice.id, &burger, 2))
        .await
        .unwrap();
    let second = store.checkout(alice.id, Utc::now()).await.unwrap().unwrap();
    store
        .upsert_cart_line(CartLine::snapshot(bob.id, &burger, 1))
        .await
        .unwrap();
    store.checkout(bob.id, Utc::now()).await.unwrap().unwrap();

    let owned = store
        .list_orders(OrderFilter::OwnedBy(alice.id))
        .await
        .unwrap();
    let ids: Vec<_> = owned.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(owned[0].items[0].quantity, 2);
}

#[tokio::test]
async fn identity_tokens_and_groups() {
    let store = get_test_store().await;
    let alice = seed_user(&store, "alice").await;

    let duplicate = store.register_user("alice", "other@example.com").await;
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

    store.issue_token(alice.id, "secret").await.unwrap();
    let authenticated = store.authenticate("secret").await.unwrap().unwrap();
    assert_eq!(authenticated.id, alice.id);
    assert!(store.authenticate("nope").await.unwrap().is_none());

    assert!(!store.has_group(alice.id, Group::Manager).await.unwrap());
    store.add_to_group(alice.id, Group::Manager).await.unwrap();
    store.add_to_group(alice.id, Group::Manager).await.unwrap();
    assert!(store.has_group(alice.id, Group::Manager).await.unwrap());
    assert_eq!(store.group_members(Group::Manager).await.unwrap().len(), 1);

    store
        .remove_from_group(alice.id, Group::Manager)
        .await
        .unwrap();
    assert!(!store.has_group(alice.id, Group::Manager).await.unwrap());

    let ghost = common::UserId::new();
    let result = store.add_to_group(ghost, Group::DeliveryCrew).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}
