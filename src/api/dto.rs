//! Wire shapes of the HTTP API. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DetectiveError, Result};
use crate::graph::{Relationship, RelationshipGroup, RelationshipType, TypeFilter};
use crate::store::Person;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDto {
    pub person1_id: Uuid,
    pub person2_id: Uuid,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

impl From<Relationship> for RelationshipDto {
    fn from(rel: Relationship) -> Self {
        Self {
            person1_id: rel.person_id1,
            person2_id: rel.person_id2,
            kind: rel.kind,
        }
    }
}

/// Body of `POST /persons/relationships`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPersonsDto {
    pub person1_id: Uuid,
    pub person2_id: Uuid,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

/// Body of `DELETE /persons/relationships`, and the query of its GET
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPairDto {
    pub person1_id: Uuid,
    pub person2_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonDto {
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDto {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Person> for PersonDto {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            full_name: person.full_name,
            created_at: person.created_at,
        }
    }
}

/// One registry entry as served by `GET /relationship-types`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipTypeDto {
    pub name: RelationshipType,
    pub inverse: RelationshipType,
    pub group: Option<RelationshipGroup>,
    pub label: String,
}

impl From<RelationshipType> for RelationshipTypeDto {
    fn from(kind: RelationshipType) -> Self {
        Self {
            name: kind,
            inverse: kind.inverse(),
            group: kind.group(),
            label: kind.label().to_string(),
        }
    }
}

/// Query of `GET /persons/{id}/relationships`.
///
/// `only` and `exclude` are comma-separated type names; `group` adds a
/// whole group to the allow-list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipsQuery {
    pub depth: Option<usize>,
    pub only: Option<String>,
    pub exclude: Option<String>,
    pub group: Option<String>,
}

fn parse_types(list: &str) -> Result<Vec<RelationshipType>> {
    list.split(',')
        .filter(|name| !name.trim().is_empty())
        .map(|name| {
            name.parse()
                .map_err(|e: crate::graph::UnknownRelationshipType| {
                    DetectiveError::InvalidInput(e.to_string())
                })
        })
        .collect()
}

impl RelationshipsQuery {
    pub fn type_filter(&self) -> Result<TypeFilter> {
        let mut allowed = Vec::new();
        if let Some(only) = &self.only {
            allowed.extend(parse_types(only)?);
        }
        if let Some(group) = &self.group {
            let group: RelationshipGroup = group
                .parse()
                .map_err(|e: crate::graph::UnknownRelationshipType| {
                    DetectiveError::InvalidInput(e.to_string())
                })?;
            allowed.extend_from_slice(group.types());
        }
        let has_allow_list = self.only.is_some() || self.group.is_some();

        match (&self.exclude, has_allow_list) {
            (Some(_), true) => Err(DetectiveError::InvalidInput(
                "Use either an allow-list (only/group) or exclude, not both".to_string(),
            )),
            (Some(exclude), false) => Ok(TypeFilter::except(parse_types(exclude)?)),
            (None, true) => Ok(TypeFilter::only(allowed)),
            (None, false) => Ok(TypeFilter::All),
        }
    }
}
