//! Error types for the Corral engine.

use crate::EntityId;
use thiserror::Error;

/// All possible errors from the Corral engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // State errors
    #[error("store '{store}' was given the same state reference it already holds; return a new state instead of mutating")]
    Immutability { store: String },

    // Entity errors
    #[error("entity does not exist: {0}")]
    EntityNotExists(EntityId),

    #[error("the id key can only be changed when updating a single entity")]
    UpdateIdKey,

    #[error("there is no active entity to update")]
    NoActive,

    #[error("an entity with id {0} already exists")]
    IdConflict(EntityId),

    #[error("entity has no usable '{key}' field (expected a string or integer)")]
    MissingId { key: String },

    #[error("entity given for id {expected} carries id {found}")]
    IdMismatch { expected: EntityId, found: EntityId },

    // Patch errors
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::EntityNotExists(EntityId::from(100));
        assert_eq!(err.to_string(), "entity does not exist: 100");

        let err = Error::Immutability {
            store: "themes".into(),
        };
        assert!(err.to_string().starts_with("store 'themes'"));

        let err = Error::MissingId { key: "todoId".into() };
        assert_eq!(
            err.to_string(),
            "entity has no usable 'todoId' field (expected a string or integer)"
        );

        let err = Error::IdMismatch {
            expected: EntityId::from(1),
            found: EntityId::from("a"),
        };
        assert_eq!(err.to_string(), "entity given for id 1 carries id a");
    }
}
