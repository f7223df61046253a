//! Relationship type registry: the closed set of relationship kinds and their inverses.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of relationship between two persons.
///
/// A stored edge `(a, b, t)` reads "a is the `t` of b"; its reverse edge
/// always carries [`RelationshipType::inverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    Parent,
    StepParent,
    Child,
    StepChild,
    Friend,
    Spouse,
    ExSpouse,
    Sibling,
    StepSiblings,
    Employer,
    Employee,
    Colleague,
    Mentor,
    Protege,
    NoMore,
}

/// Returned when a relationship type name is not part of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown relationship type: {0}")]
pub struct UnknownRelationshipType(pub String);

impl RelationshipType {
    pub const ALL: [RelationshipType; 15] = [
        RelationshipType::Parent,
        RelationshipType::StepParent,
        RelationshipType::Child,
        RelationshipType::StepChild,
        RelationshipType::Friend,
        RelationshipType::Spouse,
        RelationshipType::ExSpouse,
        RelationshipType::Sibling,
        RelationshipType::StepSiblings,
        RelationshipType::Employer,
        RelationshipType::Employee,
        RelationshipType::Colleague,
        RelationshipType::Mentor,
        RelationshipType::Protege,
        RelationshipType::NoMore,
    ];

    /// The type carried by the reverse edge.
    pub fn inverse(self) -> RelationshipType {
        use RelationshipType::*;
        match self {
            Parent => Child,
            StepParent => StepChild,
            Child => Parent,
            StepChild => StepParent,
            Employer => Employee,
            Employee => Employer,
            Mentor => Protege,
            Protege => Mentor,
            Friend | Spouse | ExSpouse | Sibling | StepSiblings | Colleague | NoMore => self,
        }
    }

    pub fn is_symmetric(self) -> bool {
        self.inverse() == self
    }

    pub fn group(self) -> Option<RelationshipGroup> {
        RelationshipGroup::ALL
            .into_iter()
            .find(|group| group.types().contains(&self))
    }

    pub fn as_str(self) -> &'static str {
        use RelationshipType::*;
        match self {
            Parent => "Parent",
            StepParent => "StepParent",
            Child => "Child",
            StepChild => "StepChild",
            Friend => "Friend",
            Spouse => "Spouse",
            ExSpouse => "ExSpouse",
            Sibling => "Sibling",
            StepSiblings => "StepSiblings",
            Employer => "Employer",
            Employee => "Employee",
            Colleague => "Colleague",
            Mentor => "Mentor",
            Protege => "Protege",
            NoMore => "NoMore",
        }
    }

    /// Human-readable label for admin clients.
    pub fn label(self) -> &'static str {
        use RelationshipType::*;
        match self {
            Parent => "Parent",
            StepParent => "Adoptive parent",
            Child => "Child",
            StepChild => "Adopted child",
            Friend => "Friend",
            Spouse => "Spouse",
            ExSpouse => "Former spouse",
            Sibling => "Brother/Sister",
            StepSiblings => "Stepbrother/Stepsister",
            Employer => "Employer",
            Employee => "Employee",
            Colleague => "Colleague",
            Mentor => "Mentor",
            Protege => "Protege",
            NoMore => "Former relationship",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = UnknownRelationshipType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownRelationshipType(name.to_string()))
    }
}

impl ToSql for RelationshipType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RelationshipType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let name = value.as_str()?;
        name.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Semantic grouping used by filters and clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipGroup {
    Family,
    Work,
}

impl RelationshipGroup {
    pub const ALL: [RelationshipGroup; 2] = [RelationshipGroup::Family, RelationshipGroup::Work];

    pub fn types(self) -> &'static [RelationshipType] {
        use RelationshipType::*;
        match self {
            RelationshipGroup::Family => &[
                Parent,
                StepParent,
                Child,
                StepChild,
                Spouse,
                ExSpouse,
                Sibling,
                StepSiblings,
            ],
            RelationshipGroup::Work => &[Employer, Employee, Colleague, Mentor, Protege],
        }
    }
}

impl FromStr for RelationshipGroup {
    type Err = UnknownRelationshipType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "family" => Ok(RelationshipGroup::Family),
            "work" => Ok(RelationshipGroup::Work),
            other => Err(UnknownRelationshipType(format!("group '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_is_involution() {
        for t in RelationshipType::ALL {
            assert_eq!(t.inverse().inverse(), t, "inverse not involutive for {}", t);
        }
    }

    #[test]
    fn test_directional_pairs() {
        assert_eq!(RelationshipType::Parent.inverse(), RelationshipType::Child);
        assert_eq!(RelationshipType::StepChild.inverse(), RelationshipType::StepParent);
        assert_eq!(RelationshipType::Employer.inverse(), RelationshipType::Employee);
        assert_eq!(RelationshipType::Protege.inverse(), RelationshipType::Mentor);
    }

    #[test]
    fn test_symmetric_types() {
        let symmetric: Vec<_> = RelationshipType::ALL
            .into_iter()
            .filter(|t| t.is_symmetric())
            .collect();
        assert_eq!(
            symmetric,
            vec![
                RelationshipType::Friend,
                RelationshipType::Spouse,
                RelationshipType::ExSpouse,
                RelationshipType::Sibling,
                RelationshipType::StepSiblings,
                RelationshipType::Colleague,
                RelationshipType::NoMore,
            ]
        );
    }

    #[test]
    fn test_groups_are_disjoint_and_closed_under_inverse() {
        for t in RelationshipGroup::Family.types() {
            assert!(!RelationshipGroup::Work.types().contains(t));
            assert!(RelationshipGroup::Family.types().contains(&t.inverse()));
        }
        for t in RelationshipGroup::Work.types() {
            assert!(RelationshipGroup::Work.types().contains(&t.inverse()));
        }
        assert_eq!(RelationshipType::Friend.group(), None);
        assert_eq!(RelationshipType::NoMore.group(), None);
        assert_eq!(RelationshipType::Sibling.group(), Some(RelationshipGroup::Family));
        assert_eq!(RelationshipType::Mentor.group(), Some(RelationshipGroup::Work));
    }

    #[test]
    fn test_parse_names() {
        for t in RelationshipType::ALL {
            assert_eq!(t.as_str().parse::<RelationshipType>().unwrap(), t);
        }
        assert_eq!(" friend ".parse::<RelationshipType>().unwrap(), RelationshipType::Friend);
        let err = "Cousin".parse::<RelationshipType>().unwrap_err();
        assert!(err.to_string().contains("Cousin"));
    }

    #[test]
    fn test_serde_uses_variant_name() {
        let json = serde_json::to_string(&RelationshipType::StepSiblings).unwrap();
        assert_eq!(json, "\"StepSiblings\"");
        let parsed: RelationshipType = serde_json::from_str("\"Employer\"").unwrap();
        assert_eq!(parsed, RelationshipType::Employer);
        assert!(serde_json::from_str::<RelationshipType>("\"Cousin\"").is_err());
    }

    #[test]
    fn test_group_parse() {
        assert_eq!("Family".parse::<RelationshipGroup>().unwrap(), RelationshipGroup::Family);
        assert_eq!("work".parse::<RelationshipGroup>().unwrap(), RelationshipGroup::Work);
        assert!("hobby".parse::<RelationshipGroup>().is_err());
    }
}
