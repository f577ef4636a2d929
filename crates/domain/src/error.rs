//! Domain error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Every variant carries a human-readable detail; the HTTP layer turns each
/// variant into one status code.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced entity does not exist, or the caller may not see it.
    #[error("{0}")]
    NotFound(String),

    /// The caller is authenticated but lacks the required capability.
    #[error("{0}")]
    Forbidden(String),

    /// No identity could be resolved for the caller.
    #[error("{0}")]
    Unauthenticated(String),

    /// An input value is out of range or missing.
    #[error("{0}")]
    InvalidArgument(String),

    /// The operation conflicts with the current state.
    #[error("{0}")]
    InvalidState(String),

    /// The persistence layer failed.
    #[error("storage unavailable: {0}")]
    Unavailable(StoreError),
}

impl DomainError {
    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound(format!("{entity} {id} not found"))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(detail) => DomainError::InvalidState(detail),
            StoreError::NotFound { entity, id } => DomainError::not_found(entity, id),
            StoreError::OutOfRange(detail) => {
                DomainError::InvalidArgument(format!("{detail} is out of range"))
            }
            other => DomainError::Unavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_becomes_invalid_state() {
        let err: DomainError = StoreError::Conflict("slug taken".to_string()).into();
        assert!(matches!(err, DomainError::InvalidState(ref d) if d == "slug taken"));
    }

    #[test]
    fn store_not_found_keeps_entity_and_id() {
        let err: DomainError = StoreError::NotFound {
            entity: "Category",
            id: "abc".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Category abc not found");
    }

    #[test]
    fn store_out_of_range_is_invalid_argument() {
        let err: DomainError = StoreError::OutOfRange("quantity 3000000000".to_string()).into();
        assert!(matches!(err, DomainError::InvalidArgument(ref d) if d.contains("out of range")));
    }

    #[test]
    fn other_store_errors_are_unavailable() {
        let err: DomainError = StoreError::InvalidRow("bad".to_string()).into();
        assert!(matches!(err, DomainError::Unavailable(_)));
    }
}
