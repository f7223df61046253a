//! Relationship and person storage.
//!
//! The traits here are the only way the graph and service layers touch
//! persisted data. Implementations own the two-row representation of a
//! relationship and must write or delete both rows as one unit.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::graph::{Relationship, RelationshipType};

/// Storage layer error type.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("person not found: {0}")]
    PersonNotFound(Uuid),

    #[error("relationship not found: {person_id1} -> {person_id2}")]
    RelationshipNotFound { person_id1: Uuid, person_id2: Uuid },

    #[error("person already exists: {0}")]
    PersonAlreadyExists(Uuid),

    #[error("database operation failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A graph vertex. Only identity matters to the relationship graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Directed relationship edges between persons.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// All edges whose source is `person_id`.
    ///
    /// Fails with [`StoreError::PersonNotFound`] when the person does not exist.
    async fn outgoing_relationships(&self, person_id: Uuid) -> Result<Vec<Relationship>>;

    /// Upserts `(id1, id2, kind)` and `(id2, id1, kind.inverse())` together, or
    /// deletes both rows when `kind` is `None`.
    ///
    /// Deleting fails with [`StoreError::RelationshipNotFound`] if either
    /// direction is missing, leaving the store unchanged.
    async fn set_relationship(
        &self,
        id1: Uuid,
        id2: Uuid,
        kind: Option<RelationshipType>,
    ) -> Result<()>;

    async fn get_relationship(&self, id1: Uuid, id2: Uuid) -> Result<RelationshipType>;
}

/// Person vertices. Deleting a person removes every edge touching it.
#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn create_person(&self, id: Uuid, full_name: Option<String>) -> Result<Person>;

    async fn get_person(&self, id: Uuid) -> Result<Person>;

    async fn delete_person(&self, id: Uuid) -> Result<()>;
}

/// Everything the service layer needs from storage.
pub trait Store: PersonStore + RelationshipStore {}

impl<T: PersonStore + RelationshipStore> Store for T {}
