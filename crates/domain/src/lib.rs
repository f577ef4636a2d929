//! Domain layer for the restaurant ordering service.
//!
//! This crate provides the services the HTTP adapter calls:
//! - `CartService` for the caller's own cart
//! - `OrderService` for checkout and the order workflow
//! - `CatalogService` and `GroupService` for manager maintenance
//! - `AccessPolicy` for capability checks shared by all of them

pub mod access;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod groups;
pub mod order;

pub use access::{AccessPolicy, Capability};
pub use cart::{CartContents, CartService, MAX_LINE_QUANTITY, PricedLine};
pub use catalog::{CatalogService, MenuItemChanges, NewMenuItem};
pub use error::DomainError;
pub use groups::GroupService;
pub use order::{OrderChanges, OrderService, OrderStage, OrderUpdate};
