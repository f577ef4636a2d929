//! Persistence layer for the restaurant ordering service.
//!
//! Provides the store traits consumed by the domain services and two
//! implementations: an in-memory store for tests and single-node runs, and a
//! PostgreSQL store backed by `sqlx`.

pub mod error;
pub mod identity;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use identity::IdentityProvider;
pub use memory::InMemoryStore;
pub use model::{
    CartLine, Category, Group, MenuItem, Order, OrderFilter, OrderItem, OrderPatch, OrderStatus,
    User,
};
pub use postgres::PostgresStore;
pub use query::{MAX_PER_PAGE, MenuOrdering, MenuQuery};
pub use store::{CartStore, CatalogStore, OrderStore, Store};
