//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{Group, IdentityProvider, InMemoryStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
}

impl TestApp {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        api::bootstrap_manager(&store, "manager", "manager-token")
            .await
            .unwrap();
        let state = api::create_default_state(store.clone());
        let app = api::create_app(Arc::clone(&state), get_metrics_handle());
        Self { app, store }
    }

    /// Registers a user with a token, optionally in a group.
    async fn user(&self, username: &str, group: Option<Group>) -> (store::User, String) {
        let user = self
            .store
            .register_user(username, &format!("{username}@example.com"))
            .await
            .unwrap();
        let token = format!("{username}-token");
        self.store.issue_token(user.id, &token).await.unwrap();
        if let Some(group) = group {
            self.store.add_to_group(user.id, group).await.unwrap();
        }
        (user, token)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Token {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Creates a category and a menu item as the manager; returns the item id.
    async fn seed_item(&self, title: &str, price_cents: i64) -> String {
        let (_, categories) = self
            .send("GET", "/api/categories", Some("manager-token"), None)
            .await;
        let category_id = match categories.as_array().and_then(|c| c.first()) {
            Some(category) => category["id"].as_str().unwrap().to_string(),
            None => {
                let (status, category) = self
                    .send(
                        "POST",
                        "/api/categories",
                        Some("manager-token"),
                        Some(json!({ "slug": "mains", "title": "Mains" })),
                    )
                    .await;
                assert_eq!(status, StatusCode::CREATED);
                category["id"].as_str().unwrap().to_string()
            }
        };

        let (status, item) = self
            .send(
                "POST",
                "/api/menu-items",
                Some("manager-token"),
                Some(json!({
                    "title": title,
                    "price_cents": price_cents,
                    "featured": false,
                    "inventory": 10,
                    "category_id": category_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        item["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, json) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_requires_token() {
    let app = TestApp::new().await;

    let (status, json) = app.send("GET", "/api/menu-items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().is_some());

    let (status, _) = app
        .send("GET", "/api/menu-items", Some("bogus"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_cannot_write_menu() {
    let app = TestApp::new().await;
    let (_, token) = app.user("carol", None).await;

    let (status, json) = app
        .send(
            "POST",
            "/api/categories",
            Some(&token),
            Some(json!({ "slug": "drinks", "title": "Drinks" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_menu_listing_and_patch() {
    let app = TestApp::new().await;
    let (_, token) = app.user("carol", None).await;
    let burger = app.seed_item("Burger", 1200).await;
    app.seed_item("Salad", 800).await;

    let (status, json) = app
        .send(
            "GET",
            "/api/menu-items?ordering=price&perpage=1",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Salad");
    assert_eq!(items[0]["price"], "$8.00");

    let (status, _) = app
        .send("GET", "/api/menu-items?ordering=title", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            "PATCH",
            &format!("/api/menu-items/{burger}"),
            Some("manager-token"),
            Some(json!({ "featured": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["featured"], true);
    assert_eq!(json["price_cents"], 1200);

    let (status, _) = app
        .send("GET", "/api/menu-items/not-a-uuid", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_menu_paging_bounds() {
    let app = TestApp::new().await;
    let (_, token) = app.user("carol", None).await;
    app.seed_item("Burger", 1200).await;

    let (status, json) = app
        .send(
            "GET",
            &format!("/api/menu-items?page={}&perpage=100", usize::MAX),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());

    let (status, _) = app
        .send("GET", "/api/menu-items?page=0", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_amounts_are_bad_requests() {
    let app = TestApp::new().await;
    let (_, token) = app.user("carol", None).await;
    let burger = app.seed_item("Burger", 1250).await;

    let (_, categories) = app
        .send("GET", "/api/categories", Some("manager-token"), None)
        .await;
    let (status, _) = app
        .send(
            "POST",
            "/api/menu-items",
            Some("manager-token"),
            Some(json!({
                "title": "Gold Leaf Steak",
                "price_cents": 1_000_000,
                "category_id": categories[0]["id"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            "POST",
            "/api/cart/menu-items",
            Some(&token),
            Some(json!({ "menu_item_id": burger, "quantity": 3_000_000_000_i64 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("quantity"));

    let (status, cart) = app
        .send("GET", "/api/cart/menu-items", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_to_order_flow() {
    let app = TestApp::new().await;
    let (_, token) = app.user("carol", None).await;
    let burger = app.seed_item("Burger", 1250).await;

    let (status, _) = app
        .send(
            "POST",
            "/api/cart/menu-items",
            Some(&token),
            Some(json!({ "menu_item_id": burger, "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, line) = app
        .send(
            "POST",
            "/api/cart/menu-items",
            Some(&token),
            Some(json!({ "menu_item_id": burger, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(line["line_total_cents"], 2500);

    let (status, cart) = app
        .send("GET", "/api/cart/menu-items", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 2500);

    let (status, order) = app.send("POST", "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total_cents"], 2500);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["stage"], "Created");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let (_, cart) = app
        .send("GET", "/api/cart/menu-items", Some(&token), None)
        .await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let (status, _) = app.send("POST", "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let order_id = order["id"].as_str().unwrap();
    let (status, items) = app
        .send(
            "GET",
            &format!("/api/orders/{order_id}/items"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items[0]["menu_item_title"], "Burger");
}

#[tokio::test]
async fn test_order_workflow_by_role() {
    let app = TestApp::new().await;
    let (_, customer) = app.user("carol", None).await;
    let (crew, crew_token) = app.user("dave", Some(Group::DeliveryCrew)).await;
    let burger = app.seed_item("Burger", 1000).await;

    app.send(
        "POST",
        "/api/cart/menu-items",
        Some(&customer),
        Some(json!({ "menu_item_id": burger, "quantity": 1 })),
    )
    .await;
    let (_, order) = app.send("POST", "/api/orders", Some(&customer), None).await;
    let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());

    // Customers cannot update
    let (status, _) = app
        .send("PATCH", &uri, Some(&customer), Some(json!({ "status": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A malformed crew id is rejected before any role check
    let (status, _) = app
        .send(
            "PATCH",
            &uri,
            Some(&customer),
            Some(json!({ "delivery_crew": "not-a-uuid" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Manager assigns crew and gets the items back
    let (status, json) = app
        .send(
            "PUT",
            &uri,
            Some("manager-token"),
            Some(json!({ "delivery_crew": crew.id.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_array());

    // Crew updates the status and gets a confirmation
    let (status, json) = app
        .send(
            "PATCH",
            &uri,
            Some(&crew_token),
            Some(json!({ "status": "delivered" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "delivered");

    let (_, visible) = app.send("GET", "/api/orders", Some(&crew_token), None).await;
    assert_eq!(visible.as_array().unwrap().len(), 1);
    assert_eq!(visible[0]["stage"], "StatusUpdated");

    // Only managers delete, and not their own orders
    let (status, _) = app.send("DELETE", &uri, Some(&crew_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("DELETE", &uri, Some("manager-token"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &uri, Some(&customer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_management() {
    let app = TestApp::new().await;
    let (dave, dave_token) = app.user("dave", None).await;

    let (status, _) = app
        .send(
            "GET",
            "/api/groups/delivery-crew/users",
            Some(&dave_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send(
            "POST",
            "/api/groups/delivery-crew/users",
            Some("manager-token"),
            Some(json!({ "username": "dave" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["username"], "dave");

    let (_, members) = app
        .send(
            "GET",
            "/api/groups/delivery-crew/users",
            Some("manager-token"),
            None,
        )
        .await;
    assert_eq!(members.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/groups/delivery-crew/users/{}", dave.id),
            Some("manager-token"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(
        !app.store
            .has_group(dave.id, Group::DeliveryCrew)
            .await
            .unwrap()
    );

    let (status, _) = app
        .send("GET", "/api/groups/admins/users", Some("manager-token"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bootstrap_manager_is_idempotent() {
    let store = InMemoryStore::new();
    let first = api::bootstrap_manager(&store, "boss", "t1").await.unwrap();
    let second = api::bootstrap_manager(&store, "boss", "t2").await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(store.has_group(first.id, Group::Manager).await.unwrap());
    assert_eq!(store.authenticate("t2").await.unwrap().unwrap().id, first.id);
}
