use geo::{Area as _, EuclideanDistance, Intersects, Point, Polygon};
use tracing::warn;

use super::{ring::Ring, Area};

/// Distance in degrees within which a point counts as lying on a ring's
/// boundary
pub const CONTAINMENT_EPSILON: f64 = 1e-9;

/// Returns `true` if `point` lies inside `polygon`, on its boundary, or
/// within [`CONTAINMENT_EPSILON`] of the boundary
fn contains(polygon: &Polygon, point: &Point) -> bool {
    polygon.intersects(point) || polygon.exterior().euclidean_distance(point) <= CONTAINMENT_EPSILON
}

/// Creates one [`Area`] per outer ring and attaches each inner ring as a hole
/// of the smallest outer ring containing its first vertex. Inner rings
/// contained in no outer ring are dropped with a warning.
///
/// Areas are returned in the order of `outers`.
pub fn attach_holes(relation_id: i64, outers: Vec<Ring>, inners: Vec<Ring>) -> Vec<Area> {
    let candidates = outers
        .iter()
        .map(|ring| {
            let polygon = ring.to_polygon();
            let area = polygon.unsigned_area();
            (polygon, area)
        })
        .collect::<Vec<_>>();

    let mut areas = outers.into_iter().map(Area::new).collect::<Vec<_>>();

    for inner in inners {
        let probe = Point::from(inner.vertices()[0].to_coord());
        let target = candidates
            .iter()
            .enumerate()
            .filter(|(_, (polygon, _))| contains(polygon, &probe))
            .min_by(|(_, (_, a)), (_, (_, b))| a.total_cmp(b))
            .map(|(i, _)| i);

        match target {
            Some(i) => areas[i].holes.push(inner),
            None => warn!(
                relation = relation_id,
                probe = %inner.vertices()[0],
                "dropping inner ring not contained in any outer ring"
            ),
        }
    }

    areas
}
