//! Order lifecycle stages.

use serde::{Deserialize, Serialize};
use store::Order;

/// Where an order sits in its lifecycle.
///
/// Stages are derived from the stored order, never stored themselves.
///
/// ```text
/// Created ──► Assigned ──► StatusUpdated
///    │            │             │
///    └────────────┴─────────────┴──► Deleted
/// ```
///
/// A status update without a crew assignment goes straight from `Created`
/// to `StatusUpdated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStage {
    /// Placed from a cart, no crew assigned, initial status.
    #[default]
    Created,

    /// A delivery crew member has been assigned.
    Assigned,

    /// The status has moved away from the initial status.
    StatusUpdated,

    /// Removed by a manager (terminal).
    Deleted,
}

impl OrderStage {
    /// Derives the stage of a stored order.
    pub fn of(order: &Order) -> Self {
        if !order.status.is_initial() {
            OrderStage::StatusUpdated
        } else if order.delivery_crew.is_some() {
            OrderStage::Assigned
        } else {
            OrderStage::Created
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStage::Deleted)
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStage::Created => "Created",
            OrderStage::Assigned => "Assigned",
            OrderStage::StatusUpdated => "StatusUpdated",
            OrderStage::Deleted => "Deleted",
        }
    }
}

impl std::fmt::Display for OrderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
