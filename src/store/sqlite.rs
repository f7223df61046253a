//! SQLite-backed store. Each logical relationship is two rows keyed by the
//! ordered person pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{Person, PersonStore, RelationshipStore, Result, StoreError};
use crate::db::Db;
use crate::graph::{Relationship, RelationshipType};

pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    let created_at: String = row.get(2)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);
    Ok(Person {
        id: uuid_column(row, 0)?,
        full_name: row.get(1)?,
        created_at,
    })
}

fn ensure_person(conn: &Connection, id: Uuid) -> Result<()> {
    let exists = conn
        .prepare_cached("SELECT 1 FROM persons WHERE id = ?1")?
        .exists(params![id.to_string()])?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::PersonNotFound(id))
    }
}

fn upsert_edge(conn: &Connection, id1: Uuid, id2: Uuid, kind: RelationshipType) -> Result<()> {
    conn.execute(
        "INSERT INTO relationships (person1_id, person2_id, type) VALUES (?1, ?2, ?3) \
         ON CONFLICT(person1_id, person2_id) DO UPDATE SET type = excluded.type",
        params![id1.to_string(), id2.to_string(), kind],
    )?;
    Ok(())
}

fn delete_edge(conn: &Connection, id1: Uuid, id2: Uuid) -> Result<()> {
    let deleted = conn.execute(
        "DELETE FROM relationships WHERE person1_id = ?1 AND person2_id = ?2",
        params![id1.to_string(), id2.to_string()],
    )?;
    if deleted == 0 {
        return Err(StoreError::RelationshipNotFound {
            person_id1: id1,
            person_id2: id2,
        });
    }
    Ok(())
}

#[async_trait]
impl RelationshipStore for SqliteStore {
    async fn outgoing_relationships(&self, person_id: Uuid) -> Result<Vec<Relationship>> {
        self.db
            .with_connection(move |conn| {
                ensure_person(conn, person_id)?;
                let mut stmt = conn.prepare_cached(
                    "SELECT person1_id, person2_id, type FROM relationships \
                     WHERE person1_id = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map(params![person_id.to_string()], |row| {
                    Ok(Relationship {
                        person_id1: uuid_column(row, 0)?,
                        person_id2: uuid_column(row, 1)?,
                        kind: row.get(2)?,
                    })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn set_relationship(
        &self,
        id1: Uuid,
        id2: Uuid,
        kind: Option<RelationshipType>,
    ) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                // Dropping the transaction on an early return rolls back, so a
                // failed second row never leaves the first one visible.
                let tx = conn.transaction()?;
                ensure_person(&tx, id1)?;
                ensure_person(&tx, id2)?;
                match kind {
                    Some(kind) => {
                        upsert_edge(&tx, id1, id2, kind)?;
                        upsert_edge(&tx, id2, id1, kind.inverse())?;
                    }
                    None => {
                        delete_edge(&tx, id1, id2)?;
                        delete_edge(&tx, id2, id1)?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    async fn get_relationship(&self, id1: Uuid, id2: Uuid) -> Result<RelationshipType> {
        self.db
            .with_connection(move |conn| {
                let kind: Option<RelationshipType> = conn
                    .query_row(
                        "SELECT type FROM relationships WHERE person1_id = ?1 AND person2_id = ?2",
                        params![id1.to_string(), id2.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                kind.ok_or(StoreError::RelationshipNotFound {
                    person_id1: id1,
                    person_id2: id2,
                })
            })
            .await
    }
}

#[async_trait]
impl PersonStore for SqliteStore {
    async fn create_person(&self, id: Uuid, full_name: Option<String>) -> Result<Person> {
        let person = Person {
            id,
            full_name,
            created_at: Utc::now(),
        };
        let row = person.clone();
        self.db
            .with_connection(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO persons (id, full_name, created_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(id) DO NOTHING",
                    params![row.id.to_string(), row.full_name, row.created_at.to_rfc3339()],
                )?;
                if inserted == 0 {
                    return Err(StoreError::PersonAlreadyExists(row.id));
                }
                Ok(())
            })
            .await?;
        Ok(person)
    }

    async fn get_person(&self, id: Uuid) -> Result<Person> {
        self.db
            .with_connection(move |conn| {
                conn.query_row(
                    "SELECT id, full_name, created_at FROM persons WHERE id = ?1",
                    params![id.to_string()],
                    person_from_row,
                )
                .optional()?
                .ok_or(StoreError::PersonNotFound(id))
            })
            .await
    }

    async fn delete_person(&self, id: Uuid) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                // Edges go with the person through ON DELETE CASCADE.
                let deleted = conn.execute("DELETE FROM persons WHERE id = ?1", params![id.to_string()])?;
                if deleted == 0 {
                    return Err(StoreError::PersonNotFound(id));
                }
                Ok(())
            })
            .await
    }
}
