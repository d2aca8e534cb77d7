use std::collections::BTreeMap;

use super::GeoCoordinate;

/// Key/value tags attached to an element
pub type Tags = BTreeMap<String, String>;

/// An ordered sequence of coordinates. A way is closed if its first and last
/// coordinates are equal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Way {
    pub coordinates: Vec<GeoCoordinate>,
}

impl Way {
    pub fn new(coordinates: Vec<GeoCoordinate>) -> Self {
        Self { coordinates }
    }

    pub fn is_closed(&self) -> bool {
        self.coordinates.len() > 1 && self.coordinates.first() == self.coordinates.last()
    }
}

impl From<Vec<GeoCoordinate>> for Way {
    fn from(coordinates: Vec<GeoCoordinate>) -> Self {
        Self { coordinates }
    }
}

/// The role a way plays inside a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Outer,
    Inner,
    Other(String),
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "outer" => Role::Outer,
            "inner" => Role::Inner,
            other => Role::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub role: Role,
    pub way: Way,
}

impl Member {
    pub fn new(role: impl Into<Role>, way: impl Into<Way>) -> Self {
        Self {
            role: role.into(),
            way: way.into(),
        }
    }
}

/// A tagged aggregate of member ways, e.g. a building with courtyards
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relation {
    pub id: i64,
    pub tags: Tags,
    pub members: Vec<Member>,
}

impl Relation {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns `true` if the relation describes an area (i.e. its `type` is
    /// `multipolygon` or `boundary`)
    pub fn is_area(&self) -> bool {
        matches!(self.tag("type"), Some("multipolygon") | Some("boundary"))
    }

    /// Iterates over all coordinates of all member ways
    pub fn coordinates(&self) -> impl Iterator<Item = &GeoCoordinate> {
        self.members.iter().flat_map(|m| m.way.coordinates.iter())
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, EqualityAssertion};

    use crate::model::GeoCoordinate;

    use super::{Relation, Role, Way};

    #[test]
    fn roles() {
        assert_that!(Role::from("outer")).is_equal_to(Role::Outer);
        assert_that!(Role::from("inner")).is_equal_to(Role::Inner);
        assert_that!(Role::from("subarea")).is_equal_to(Role::Other("subarea".to_string()));
    }

    #[test]
    fn closed_way() {
        let a = GeoCoordinate::new(0.0, 0.0);
        let b = GeoCoordinate::new(1.0, 0.0);
        let c = GeoCoordinate::new(1.0, 1.0);
        assert!(Way::new(vec![a, b, c, a]).is_closed());
        assert!(!Way::new(vec![a, b, c]).is_closed());
        assert!(!Way::new(vec![a]).is_closed());
    }

    #[test]
    fn area_relations() {
        let mut relation = Relation::default();
        assert!(!relation.is_area());
        relation
            .tags
            .insert("type".to_string(), "multipolygon".to_string());
        assert!(relation.is_area());
        relation.tags.insert("type".to_string(), "route".to_string());
        assert!(!relation.is_area());
    }
}
