//! Shared types for the restaurant ordering service.

mod money;
mod types;

pub use money::Money;
pub use types::{CategoryId, MenuItemId, OrderId, UserId};
