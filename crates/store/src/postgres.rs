use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, MenuItemId, Money, OrderId, UserId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    IdentityProvider, MenuQuery, Result, StoreError,
    model::{
        CartLine, Category, Group, MenuItem, Order, OrderFilter, OrderItem, OrderPatch,
        OrderStatus, User,
    },
    store::{CartStore, CatalogStore, OrderStore},
};

const MENU_ITEM_COLUMNS: &str =
    "m.id, m.title, m.price_cents, m.featured, m.inventory, m.category_id";
const ORDER_COLUMNS: &str = "id, user_id, delivery_crew, status, total_cents, created_at";
const ORDER_ITEM_COLUMNS: &str =
    "order_id, menu_item_id, menu_item_title, quantity, unit_price_cents, line_total_cents";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Serializes cart writes for one user until the transaction ends.
    async fn lock_cart(conn: &mut PgConnection, user_id: UserId) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(user_id.to_string())
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Self::row_to_order_item)
        .collect::<Result<Vec<_>>>()?;

        Self::row_to_order(row, items).map(Some)
    }

    fn row_to_category(row: PgRow) -> Result<Category> {
        Ok(Category {
            id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
        })
    }

    fn row_to_menu_item(row: PgRow) -> Result<MenuItem> {
        Ok(MenuItem {
            id: MenuItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            featured: row.try_get("featured")?,
            inventory: from_db_int(row.try_get("inventory")?, "inventory")?,
            category_id: CategoryId::from_uuid(row.try_get::<Uuid, _>("category_id")?),
        })
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            menu_item_id: MenuItemId::from_uuid(row.try_get::<Uuid, _>("menu_item_id")?),
            menu_item_title: row.try_get("menu_item_title")?,
            quantity: from_db_int(row.try_get("quantity")?, "quantity")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            menu_item_id: MenuItemId::from_uuid(row.try_get::<Uuid, _>("menu_item_id")?),
            menu_item_title: row.try_get("menu_item_title")?,
            quantity: from_db_int(row.try_get("quantity")?, "quantity")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            line_total: Money::from_cents(row.try_get("line_total_cents")?),
        })
    }

    fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            delivery_crew: row
                .try_get::<Option<Uuid>, _>("delivery_crew")?
                .map(UserId::from_uuid),
            status: OrderStatus::parse(&status)
                .ok_or_else(|| StoreError::InvalidRow("blank order status".to_string()))?,
            total: Money::from_cents(row.try_get("total_cents")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            items,
        })
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
        })
    }
}

fn to_db_int(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::OutOfRange(format!("{field} {value}")))
}

fn from_db_int(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow(format!("negative {field}: {value}")))
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Maps constraint violations on writes to store errors.
fn write_error(err: sqlx::Error, entity: &'static str, id: impl ToString) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::not_found(entity, id);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query("SELECT id, slug, title FROM categories ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_category)
            .collect()
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        sqlx::query("SELECT id, slug, title FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_category)
            .transpose()
    }

    async fn insert_category(&self, category: Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, slug, title) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.slug)
            .bind(&category.title)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.is_unique_violation() {
                        return StoreError::Conflict(format!(
                            "category slug '{}' already exists",
                            category.slug
                        ));
                    }
                }
                StoreError::Database(e)
            })?;
        Ok(())
    }

    async fn list_menu_items(&self, query: &MenuQuery) -> Result<Vec<MenuItem>> {
        let mut sql = format!(
            "SELECT {MENU_ITEM_COLUMNS} FROM menu_items m \
             JOIN categories c ON c.id = m.category_id WHERE 1=1"
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.category_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND m.category_id = ${param_count}"));
        }
        if query.featured.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND m.featured = ${param_count}"));
        }
        if query.search.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (m.title ILIKE ${param_count} OR c.title ILIKE ${param_count})"
            ));
        }

        let ordering = query.ordering.map_or("m.title ASC", |o| o.sql());
        sql.push_str(&format!(" ORDER BY {ordering}, m.id ASC"));
        sql.push_str(&format!(
            " LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        ));

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(id) = query.category_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(featured) = query.featured {
            sqlx_query = sqlx_query.bind(featured);
        }
        if let Some(ref term) = query.search {
            sqlx_query = sqlx_query.bind(like_pattern(term));
        }
        sqlx_query = sqlx_query
            .bind(query.per_page as i64)
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_menu_item).collect()
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>> {
        sqlx::query(&format!(
            "SELECT {MENU_ITEM_COLUMNS} FROM menu_items m WHERE m.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_menu_item)
        .transpose()
    }

    async fn insert_menu_item(&self, item: MenuItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_items (id, title, price_cents, featured, inventory, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(item.price.cents())
        .bind(item.featured)
        .bind(to_db_int(item.inventory, "inventory")?)
        .bind(item.category_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Category", item.category_id))?;
        Ok(())
    }

    async fn update_menu_item(&self, item: MenuItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE menu_items
            SET title = $2, price_cents = $3, featured = $4, inventory = $5, category_id = $6
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(item.price.cents())
        .bind(item.featured)
        .bind(to_db_int(item.inventory, "inventory")?)
        .bind(item.category_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Category", item.category_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> Result<bool> {
        // cart_lines rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn upsert_cart_line(&self, line: CartLine) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_cart(&mut tx, line.user_id).await?;

        sqlx::query(
            r#"
            INSERT INTO cart_lines (user_id, menu_item_id, menu_item_title, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, menu_item_id) DO UPDATE SET
                menu_item_title = EXCLUDED.menu_item_title,
                quantity = EXCLUDED.quantity,
                unit_price_cents = EXCLUDED.unit_price_cents
            "#,
        )
        .bind(line.user_id.as_uuid())
        .bind(line.menu_item_id.as_uuid())
        .bind(&line.menu_item_title)
        .bind(to_db_int(line.quantity, "quantity")?)
        .bind(line.unit_price.cents())
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "MenuItem", line.menu_item_id))?;

        tx.commit().await?;
        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        sqlx::query(
            r#"
            SELECT user_id, menu_item_id, menu_item_title, quantity, unit_price_cents
            FROM cart_lines
            WHERE user_id = $1
            ORDER BY created_at ASC, menu_item_id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Self::row_to_cart_line)
        .collect()
    }

    async fn remove_cart_line(&self, user_id: UserId, menu_item_id: MenuItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND menu_item_id = $2")
            .bind(user_id.as_uuid())
            .bind(menu_item_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn checkout(&self, user_id: UserId, placed_at: DateTime<Utc>) -> Result<Option<Order>> {
        // Dropping the transaction on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;
        Self::lock_cart(&mut tx, user_id).await?;

        let mut rows = Vec::new();
        for row in sqlx::query(
            r#"
            DELETE FROM cart_lines
            WHERE user_id = $1
            RETURNING user_id, menu_item_id, menu_item_title, quantity, unit_price_cents, created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?
        {
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            rows.push((created_at, Self::row_to_cart_line(row)?));
        }

        if rows.is_empty() {
            return Ok(None);
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.menu_item_id.cmp(&b.1.menu_item_id)));
        let lines: Vec<CartLine> = rows.into_iter().map(|(_, line)| line).collect();
        let order = Order::from_cart(user_id, &lines, placed_at)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, delivery_crew, status, total_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.delivery_crew.map(|id| id.as_uuid()))
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, menu_item_id, menu_item_title, quantity, unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(item.menu_item_id.as_uuid())
            .bind(&item.menu_item_title)
            .bind(to_db_int(item.quantity, "quantity")?)
            .bind(item.unit_price.cents())
            .bind(item.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(order))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let (condition, owner) = match filter {
            OrderFilter::All => ("TRUE", None),
            OrderFilter::Assigned => ("delivery_crew IS NOT NULL", None),
            OrderFilter::OwnedBy(user_id) => ("user_id = $1", Some(user_id.as_uuid())),
        };
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {condition} ORDER BY created_at DESC, id ASC"
        );

        let mut query = sqlx::query(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        let order_rows = query.fetch_all(&self.pool).await?;
        if order_rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = order_rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position"
        ))
        .bind(ids.as_slice())
        .fetch_all(&self.pool)
        .await?
        {
            let item = Self::row_to_order_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        order_rows
            .into_iter()
            .map(|row| {
                let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
                let items = items_by_order.remove(&id).unwrap_or_default();
                Self::row_to_order(row, items)
            })
            .collect()
    }

    async fn update_order(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET delivery_crew = COALESCE($2, delivery_crew),
                status = COALESCE($3, status)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(patch.delivery_crew.map(|crew| crew.as_uuid()))
        .bind(patch.status.as_ref().map(OrderStatus::as_str))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let order = Self::fetch_order(&mut tx, id).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        // order_items rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityProvider for PostgresStore {
    async fn authenticate(&self, token: &str) -> Result<Option<User>> {
        sqlx::query(
            r#"
            SELECT u.id, u.username, u.email
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_user)
        .transpose()
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query("SELECT id, username, email FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_user)
            .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query("SELECT id, username, email FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_user)
            .transpose()
    }

    async fn has_group(&self, user_id: UserId, group: Group) -> Result<bool> {
        let member: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_groups WHERE user_id = $1 AND group_name = $2)",
        )
        .bind(user_id.as_uuid())
        .bind(group.name())
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn group_members(&self, group: Group) -> Result<Vec<User>> {
        sqlx::query(
            r#"
            SELECT u.id, u.username, u.email
            FROM user_groups g
            JOIN users u ON u.id = g.user_id
            WHERE g.group_name = $1
            ORDER BY u.username ASC
            "#,
        )
        .bind(group.name())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Self::row_to_user)
        .collect()
    }

    async fn add_to_group(&self, user_id: UserId, group: Group) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_groups (user_id, group_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(group.name())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "User", user_id))?;
        Ok(())
    }

    async fn remove_from_group(&self, user_id: UserId, group: Group) -> Result<()> {
        sqlx::query("DELETE FROM user_groups WHERE user_id = $1 AND group_name = $2")
            .bind(user_id.as_uuid())
            .bind(group.name())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn register_user(&self, username: &str, email: &str) -> Result<User> {
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email: email.to_string(),
        };
        sqlx::query("INSERT INTO users (id, username, email) VALUES ($1, $2, $3)")
            .bind(user.id.as_uuid())
            .bind(&user.username)
            .bind(&user.email)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "User", user.id))?;
        Ok(user)
    }

    async fn issue_token(&self, user_id: UserId, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (token, user_id) VALUES ($1, $2)
            ON CONFLICT (token) DO UPDATE SET user_id = EXCLUDED.user_id
            "#,
        )
        .bind(token)
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "User", user_id))?;
        Ok(())
    }
}
