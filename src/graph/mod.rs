//! Relationship graph: type registry, edge model and bounded BFS traversal.
//!
//! Relationships are directed edges between persons. Storage keeps both
//! directions of every logical relationship; traversal reports each
//! logical relationship once.

mod kind;
mod traversal;

pub use kind::{RelationshipGroup, RelationshipType, UnknownRelationshipType};
pub use traversal::traverse_graph;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single directed edge: `person_id1` is the `kind` of `person_id2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub person_id1: Uuid,
    pub person_id2: Uuid,
    pub kind: RelationshipType,
}

impl Relationship {
    pub fn new(person_id1: Uuid, person_id2: Uuid, kind: RelationshipType) -> Self {
        Self {
            person_id1,
            person_id2,
            kind,
        }
    }

    /// The reverse edge the store keeps alongside this one.
    pub fn opposite(&self) -> Relationship {
        Relationship::new(self.person_id2, self.person_id1, self.kind.inverse())
    }

    /// Direction-independent key of the person pair.
    pub fn pair_key(&self) -> (Uuid, Uuid) {
        if self.person_id1 <= self.person_id2 {
            (self.person_id1, self.person_id2)
        } else {
            (self.person_id2, self.person_id1)
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})->({})[{}]", self.person_id1, self.person_id2, self.kind)
    }
}

/// Which edge types a traversal records and walks through.
///
/// A filter judges the logical link, so an edge and its reverse row always
/// get the same answer: listing `Parent` also matches the `Child` row of the
/// same link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    /// Allow-list: only these types are kept.
    Only(HashSet<RelationshipType>),
    /// Deny-list: these types are skipped.
    Except(HashSet<RelationshipType>),
}

impl TypeFilter {
    pub fn only<I: IntoIterator<Item = RelationshipType>>(types: I) -> Self {
        TypeFilter::Only(types.into_iter().collect())
    }

    pub fn except<I: IntoIterator<Item = RelationshipType>>(types: I) -> Self {
        TypeFilter::Except(types.into_iter().collect())
    }

    pub fn group(group: RelationshipGroup) -> Self {
        TypeFilter::only(group.types().iter().copied())
    }

    pub fn allows(&self, kind: RelationshipType) -> bool {
        let listed = |types: &HashSet<RelationshipType>| {
            types.contains(&kind) || types.contains(&kind.inverse())
        };
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(types) => listed(types),
            TypeFilter::Except(types) => !listed(types),
        }
    }
}
