//! Person/relationship orchestration between the HTTP layer and the store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::GraphConfig;
use crate::graph::{traverse_graph, Relationship, RelationshipType, TypeFilter};
use crate::store::{Person, PersonStore, RelationshipStore, Store};
use crate::{DetectiveError, Result};

fn ensure_id(id: Uuid, name: &str) -> Result<()> {
    if id.is_nil() {
        return Err(DetectiveError::InvalidInput(format!(
            "{} can't be the nil UUID",
            name
        )));
    }
    Ok(())
}

fn ensure_pair(id1: Uuid, id2: Uuid) -> Result<()> {
    ensure_id(id1, "person1Id")?;
    ensure_id(id2, "person2Id")?;
    if id1 == id2 {
        return Err(DetectiveError::InvalidInput(
            "A person can't have a relationship with themself".to_string(),
        ));
    }
    Ok(())
}

/// Logs the error the way the request path expects and hands it back.
fn report(err: DetectiveError, context: &str) -> DetectiveError {
    match &err {
        DetectiveError::InvalidInput(_) | DetectiveError::Cancelled => {
            log::debug!("{}: {}", context, err)
        }
        DetectiveError::PersonNotFound(_)
        | DetectiveError::RelationshipNotFound(..)
        | DetectiveError::PersonAlreadyExists(_) => log::error!("{}: {}", context, err),
        _ => log::error!("{}: unexpected error: {}", context, err),
    }
    err
}

pub struct PersonService {
    store: Arc<dyn Store>,
    graph: GraphConfig,
}

impl PersonService {
    pub fn new(store: Arc<dyn Store>, graph: GraphConfig) -> Self {
        Self { store, graph }
    }

    pub fn graph_config(&self) -> &GraphConfig {
        &self.graph
    }

    /// Relationship neighborhood of `person_id`. `depth` defaults to the
    /// configured depth and may not exceed `graph.max_depth`.
    pub async fn get_person_relationships(
        &self,
        person_id: Uuid,
        depth: Option<usize>,
        filter: &TypeFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Relationship>> {
        ensure_id(person_id, "personId")?;
        let depth = depth.unwrap_or(self.graph.default_depth);
        if depth > self.graph.max_depth {
            return Err(DetectiveError::InvalidInput(format!(
                "Depth {} exceeds the maximum of {}",
                depth, self.graph.max_depth
            )));
        }

        traverse_graph(
            self.store.as_ref(),
            person_id,
            depth,
            filter,
            self.graph.fanout,
            cancel,
        )
        .await
        .map_err(|e| report(e, &format!("Relationships of {}", person_id)))
    }

    pub async fn get_persons_relationship(&self, id1: Uuid, id2: Uuid) -> Result<RelationshipType> {
        ensure_pair(id1, id2)?;
        self.store
            .get_relationship(id1, id2)
            .await
            .map_err(|e| report(e.into(), &format!("Relationship {} -> {}", id1, id2)))
    }

    pub async fn set_persons_relationship(
        &self,
        id1: Uuid,
        id2: Uuid,
        kind: RelationshipType,
    ) -> Result<()> {
        ensure_pair(id1, id2)?;
        self.store
            .set_relationship(id1, id2, Some(kind))
            .await
            .map_err(|e| report(e.into(), &format!("Set relationship {} -> {}", id1, id2)))?;
        log::info!("Relationship set: {}", Relationship::new(id1, id2, kind));
        Ok(())
    }

    pub async fn delete_relationship(&self, id1: Uuid, id2: Uuid) -> Result<()> {
        ensure_pair(id1, id2)?;
        self.store
            .set_relationship(id1, id2, None)
            .await
            .map_err(|e| report(e.into(), &format!("Delete relationship {} -> {}", id1, id2)))?;
        log::info!("Relationship deleted: {} <-> {}", id1, id2);
        Ok(())
    }

    pub async fn create_person(&self, full_name: Option<String>) -> Result<Person> {
        let full_name = full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let person = self
            .store
            .create_person(Uuid::new_v4(), full_name)
            .await
            .map_err(|e| report(e.into(), "Create person"))?;
        log::info!("Person created: {}", person.id);
        Ok(person)
    }

    pub async fn get_person(&self, id: Uuid) -> Result<Person> {
        ensure_id(id, "personId")?;
        self.store
            .get_person(id)
            .await
            .map_err(|e| report(e.into(), &format!("Person {}", id)))
    }

    pub async fn delete_person(&self, id: Uuid) -> Result<()> {
        ensure_id(id, "personId")?;
        self.store
            .delete_person(id)
            .await
            .map_err(|e| report(e.into(), &format!("Delete person {}", id)))?;
        log::info!("Person deleted: {}", id);
        Ok(())
    }
}
