use rustc_hash::FxHashMap;

use crate::model::{BoundingBox, GeoCoordinate, Relation, Tags, Way};

pub mod xml;

/// A tagged way read from a data payload
#[derive(Debug, Clone, PartialEq)]
pub struct WayElement {
    pub id: i64,
    pub tags: Tags,
    pub way: Way,
}

/// All elements read from a data payload. Way node references and relation
/// members have already been resolved to geometry.
#[derive(Debug, Default)]
pub struct Elements {
    /// The bounds declared by the payload, if any
    pub bounds: Option<BoundingBox>,

    pub nodes: FxHashMap<i64, GeoCoordinate>,

    pub ways: Vec<WayElement>,

    pub relations: Vec<Relation>,
}
