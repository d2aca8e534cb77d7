//! Reconstruction of polygons with holes from the member ways of
//! multipolygon relations.
//!
//! Member ways are split by role. Each group is stitched into closed
//! [`Ring`]s independently (see [`assemble_rings`]), and inner rings are then
//! attached to the outer ring containing them (see [`attach_holes`]).

use geo::Polygon;
use tracing::warn;

use crate::model::{GeoCoordinate, Relation, Role};

pub use self::batch::{fill_areas_batch, RelationAreas};
pub use self::holes::{attach_holes, CONTAINMENT_EPSILON};
pub use self::ring::{assemble_rings, AssemblyError, Ring};

mod batch;
mod holes;
mod ring;

/// One outer ring and the holes cut out of it
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    outer: Ring,
    holes: Vec<Ring>,
}

impl Area {
    pub fn new(outer: Ring) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn outer(&self) -> &Ring {
        &self.outer
    }

    /// The outer ring's points including the closing one
    pub fn points(&self) -> Vec<GeoCoordinate> {
        self.outer.closed_points()
    }

    pub fn holes(&self) -> &[Ring] {
        &self.holes
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(
            self.outer.to_line_string(),
            self.holes.iter().map(Ring::to_line_string).collect(),
        )
    }
}

fn fragments<'a>(relation: &'a Relation, role: Role) -> impl Iterator<Item = &'a [GeoCoordinate]> {
    relation
        .members
        .iter()
        .filter(move |m| m.role == role)
        .map(|m| m.way.coordinates.as_slice())
}

/// Builds the areas of a relation. Fails if the outer or the inner group
/// contains a chain that cannot be closed. Members with other roles are
/// ignored.
pub fn build_areas(relation: &Relation) -> Result<Vec<Area>, AssemblyError> {
    let outers = assemble_rings(fragments(relation, Role::Outer))?;
    let inners = assemble_rings(fragments(relation, Role::Inner))?;
    Ok(attach_holes(relation.id, outers, inners))
}

/// Appends the areas of `relation` to `areas`. A relation whose rings cannot
/// be assembled contributes nothing.
pub fn fill_areas(relation: &Relation, areas: &mut Vec<Area>) {
    match build_areas(relation) {
        Ok(built) => areas.extend(built),
        Err(err) => warn!(relation = relation.id, %err, "skipping relation"),
    }
}
