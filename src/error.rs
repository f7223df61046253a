use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Main error type for Detective
#[derive(Error, Debug)]
pub enum DetectiveError {
    /// Caller error detected before any store access
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Person does not exist
    #[error("Person not found: {0}")]
    PersonNotFound(Uuid),

    /// No relationship stored between the two persons
    #[error("Relationship not found between {0} and {1}")]
    RelationshipNotFound(Uuid, Uuid),

    /// Person id already taken
    #[error("Person already exists: {0}")]
    PersonAlreadyExists(Uuid),

    /// The store broke one of its own invariants (e.g. an edge names a missing person)
    #[error("Store consistency violation: {0}")]
    StoreConsistency(String),

    /// Request was cancelled or ran past its deadline
    #[error("Operation cancelled")]
    Cancelled,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Blocking database task failed to complete
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for DetectiveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PersonNotFound(id) => DetectiveError::PersonNotFound(id),
            StoreError::RelationshipNotFound { person_id1, person_id2 } => {
                DetectiveError::RelationshipNotFound(person_id1, person_id2)
            }
            StoreError::PersonAlreadyExists(id) => DetectiveError::PersonAlreadyExists(id),
            StoreError::Database(e) => DetectiveError::Database(e),
            StoreError::Task(e) => DetectiveError::Task(e),
        }
    }
}

/// Convenient Result type using DetectiveError
pub type Result<T> = std::result::Result<T, DetectiveError>;
