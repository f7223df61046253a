use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Person, PersonStore, RelationshipStore, Result, StoreError};
use crate::graph::{Relationship, RelationshipType};

#[derive(Default)]
struct State {
    persons: HashMap<Uuid, Person>,
    /// Outgoing edges per source person, in insertion order.
    edges: HashMap<Uuid, Vec<(Uuid, RelationshipType)>>,
}

impl State {
    fn ensure_person(&self, id: Uuid) -> Result<()> {
        if self.persons.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::PersonNotFound(id))
        }
    }

    fn edge(&self, id1: Uuid, id2: Uuid) -> Option<RelationshipType> {
        self.edges
            .get(&id1)?
            .iter()
            .find(|(target, _)| *target == id2)
            .map(|(_, kind)| *kind)
    }

    fn upsert(&mut self, id1: Uuid, id2: Uuid, kind: RelationshipType) {
        let out = self.edges.entry(id1).or_default();
        match out.iter().position(|(target, _)| *target == id2) {
            Some(pos) => out[pos].1 = kind,
            None => out.push((id2, kind)),
        }
    }

    fn remove(&mut self, id1: Uuid, id2: Uuid) {
        if let Some(out) = self.edges.get_mut(&id1) {
            out.retain(|(target, _)| *target != id2);
        }
    }
}

/// In-memory store. A single lock covers both rows of a relationship, so
/// readers never observe half a pair.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn outgoing_relationships(&self, person_id: Uuid) -> Result<Vec<Relationship>> {
        let state = self.state.read().await;
        state.ensure_person(person_id)?;
        Ok(state
            .edges
            .get(&person_id)
            .map(|out| {
                out.iter()
                    .map(|(target, kind)| Relationship::new(person_id, *target, *kind))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_relationship(
        &self,
        id1: Uuid,
        id2: Uuid,
        kind: Option<RelationshipType>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_person(id1)?;
        state.ensure_person(id2)?;
        match kind {
            Some(kind) => {
                state.upsert(id1, id2, kind);
                state.upsert(id2, id1, kind.inverse());
            }
            None => {
                for (from, to) in [(id1, id2), (id2, id1)] {
                    if state.edge(from, to).is_none() {
                        return Err(StoreError::RelationshipNotFound {
                            person_id1: from,
                            person_id2: to,
                        });
                    }
                }
                state.remove(id1, id2);
                state.remove(id2, id1);
            }
        }
        Ok(())
    }

    async fn get_relationship(&self, id1: Uuid, id2: Uuid) -> Result<RelationshipType> {
        self.state
            .read()
            .await
            .edge(id1, id2)
            .ok_or(StoreError::RelationshipNotFound {
                person_id1: id1,
                person_id2: id2,
            })
    }
}

#[async_trait]
impl PersonStore for MemoryStore {
    async fn create_person(&self, id: Uuid, full_name: Option<String>) -> Result<Person> {
        let mut state = self.state.write().await;
        if state.persons.contains_key(&id) {
            return Err(StoreError::PersonAlreadyExists(id));
        }
        let person = Person {
            id,
            full_name,
            created_at: Utc::now(),
        };
        state.persons.insert(id, person.clone());
        Ok(person)
    }

    async fn get_person(&self, id: Uuid) -> Result<Person> {
        self.state
            .read()
            .await
            .persons
            .get(&id)
            .cloned()
            .ok_or(StoreError::PersonNotFound(id))
    }

    async fn delete_person(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if state.persons.remove(&id).is_none() {
            return Err(StoreError::PersonNotFound(id));
        }
        if let Some(out) = state.edges.remove(&id) {
            for (target, _) in out {
                state.remove(target, id);
            }
        }
        Ok(())
    }
}
