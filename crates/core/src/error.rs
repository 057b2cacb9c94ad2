use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A stored grant names a scope the resolver does not understand, or
    /// its payload cannot be parsed. Always surfaced as a denial.
    #[error("Invalid scope configuration: {0}")]
    InvalidScope(String),

    /// A reply or forward references a parent entry that does not exist
    /// (or cannot be seen by the acting user).
    #[error("Parent history entry {parent_id} does not exist")]
    DanglingLineage { parent_id: DbId },

    #[error("Not permitted to change the privacy of history entry {entry_id}")]
    PrivacyUnauthorized { entry_id: DbId },

    /// An advisory lock held by another user blocks the operation.
    #[error("{entity} {id} is locked by user {locked_by}")]
    Locked {
        entity: &'static str,
        id: DbId,
        locked_by: DbId,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
