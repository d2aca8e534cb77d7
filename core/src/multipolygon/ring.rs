use geo::{LineString, Polygon};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::model::GeoCoordinate;

/// Raised if fragments of a role group cannot be stitched into closed rings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("{count} chain(s) left open after stitching")]
    OpenChains { count: usize },
}

/// A closed sequence of coordinates bounding a simple polygon. The closing
/// point is not stored; [`Ring::closed_points`] adds it back.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    vertices: Vec<GeoCoordinate>,
}

impl Ring {
    /// Creates a ring from a closed coordinate sequence (first == last).
    /// Returns `None` if it has fewer than three distinct vertices.
    pub fn from_closed(mut points: Vec<GeoCoordinate>) -> Option<Self> {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return None;
        }
        Some(Self { vertices: points })
    }

    /// The vertices without the closing point
    pub fn vertices(&self) -> &[GeoCoordinate] {
        &self.vertices
    }

    /// The vertices followed by the first vertex again
    pub fn closed_points(&self) -> Vec<GeoCoordinate> {
        let mut points = Vec::with_capacity(self.vertices.len() + 1);
        points.extend_from_slice(&self.vertices);
        points.push(self.vertices[0]);
        points
    }

    /// Number of points including the closing one
    pub fn point_count(&self) -> usize {
        self.vertices.len() + 1
    }

    pub fn to_line_string(&self) -> LineString {
        self.closed_points()
            .into_iter()
            .map(GeoCoordinate::to_coord)
            .collect()
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(self.to_line_string(), Vec::new())
    }
}

/// Key under which open chains are registered. `-0.0` and `0.0` map to the
/// same key.
type EndpointKey = (u64, u64);

fn endpoint_key(c: &GeoCoordinate) -> EndpointKey {
    ((c.latitude + 0.0).to_bits(), (c.longitude + 0.0).to_bits())
}

type ChainId = usize;

/// Open chains addressed by id, plus an index from each chain's two endpoints
/// to the chain
#[derive(Default)]
struct Chains {
    arena: Vec<Option<Vec<GeoCoordinate>>>,
    ends: FxHashMap<EndpointKey, Vec<ChainId>>,
}

impl Chains {
    fn insert(&mut self, chain: Vec<GeoCoordinate>) {
        let id = self.arena.len();
        self.ends
            .entry(endpoint_key(&chain[0]))
            .or_default()
            .push(id);
        self.ends
            .entry(endpoint_key(&chain[chain.len() - 1]))
            .or_default()
            .push(id);
        self.arena.push(Some(chain));
    }

    /// Finds an open chain ending at `key`
    fn find(&self, key: &EndpointKey) -> Option<ChainId> {
        self.ends.get(key).and_then(|ids| ids.first().copied())
    }

    /// Removes a chain from the arena and from both of its endpoint lists
    fn take(&mut self, id: ChainId) -> Vec<GeoCoordinate> {
        let chain = self.arena[id].take().unwrap_or_default();
        if let (Some(first), Some(last)) = (chain.first(), chain.last()) {
            for key in [endpoint_key(first), endpoint_key(last)] {
                if let Some(ids) = self.ends.get_mut(&key) {
                    if let Some(pos) = ids.iter().position(|i| *i == id) {
                        ids.remove(pos);
                    }
                    if ids.is_empty() {
                        self.ends.remove(&key);
                    }
                }
            }
        }
        chain
    }

    fn open_count(&self) -> usize {
        self.arena.iter().filter(|c| c.is_some()).count()
    }
}

/// Joins `chain` and `fragment` at a shared endpoint without duplicating it.
/// The fragment is reversed if necessary.
fn join(chain: Vec<GeoCoordinate>, mut fragment: Vec<GeoCoordinate>) -> Vec<GeoCoordinate> {
    let chain_first = endpoint_key(&chain[0]);
    let chain_last = endpoint_key(&chain[chain.len() - 1]);
    let frag_first = endpoint_key(&fragment[0]);
    let frag_last = endpoint_key(&fragment[fragment.len() - 1]);

    if chain_last == frag_first || chain_last == frag_last {
        if chain_last != frag_first {
            fragment.reverse();
        }
        let mut joined = chain;
        joined.extend_from_slice(&fragment[1..]);
        joined
    } else {
        if chain_first != frag_last {
            fragment.reverse();
        }
        fragment.extend_from_slice(&chain[1..]);
        fragment
    }
}

fn is_closed(points: &[GeoCoordinate]) -> bool {
    points.len() > 1 && endpoint_key(&points[0]) == endpoint_key(&points[points.len() - 1])
}

fn emit(rings: &mut Vec<Ring>, points: Vec<GeoCoordinate>) {
    match Ring::from_closed(points) {
        Some(ring) => rings.push(ring),
        None => debug!("dropping degenerate ring"),
    }
}

/// Stitches the fragments of one role group into closed rings.
///
/// Fragments may come in any order and direction. Closed fragments become
/// rings directly. Open ones are joined with an open chain sharing one of
/// their endpoints; a joined chain is looked up again under its new endpoints
/// so that a fragment bridging two chains merges both. Rings are returned in
/// the order they were closed.
///
/// Fails if any chain is still open once all fragments have been consumed.
pub fn assemble_rings<'a, I>(fragments: I) -> Result<Vec<Ring>, AssemblyError>
where
    I: IntoIterator<Item = &'a [GeoCoordinate]>,
{
    let mut rings = Vec::new();
    let mut chains = Chains::default();

    for fragment in fragments {
        let mut current = fragment.to_vec();
        current.dedup_by(|a, b| endpoint_key(a) == endpoint_key(b));
        if current.len() < 2 {
            debug!(len = fragment.len(), "skipping fragment with less than two distinct points");
            continue;
        }

        loop {
            if is_closed(&current) {
                emit(&mut rings, current);
                break;
            }

            let first = endpoint_key(&current[0]);
            let last = endpoint_key(&current[current.len() - 1]);
            match chains.find(&first).or_else(|| chains.find(&last)) {
                Some(id) => {
                    let chain = chains.take(id);
                    current = join(chain, current);
                }
                None => {
                    chains.insert(current);
                    break;
                }
            }
        }
    }

    match chains.open_count() {
        0 => Ok(rings),
        count => Err(AssemblyError::OpenChains { count }),
    }
}
