//! Order workflow: checkout, visibility and role-gated updates.

mod service;
mod state;

pub use service::{OrderChanges, OrderService, OrderUpdate};
pub use state::OrderStage;
