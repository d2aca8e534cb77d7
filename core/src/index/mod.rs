use rstar::RTree;

use crate::model::BoundingBox;

pub use self::chunk::Chunk;

pub mod chunk;
pub mod header;

/// A spatial index over chunk coverage boxes. Answers the question which
/// chunk covers a given query box.
///
/// The index is built once (e.g. by [`header::discover_chunks`]) and is
/// read-only afterwards. Queries take `&self`, so a built index can be shared
/// between threads without locking.
#[derive(Default)]
pub struct GeoIndex {
    tree: RTree<Chunk>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from the given chunks in one go (faster than inserting
    /// them one by one)
    pub fn bulk_load(chunks: Vec<Chunk>) -> Self {
        Self {
            tree: RTree::bulk_load(chunks),
        }
    }

    /// Registers a chunk so later queries can find it
    pub fn insert(&mut self, chunk: Chunk) {
        self.tree.insert(chunk);
    }

    /// Returns a chunk whose coverage contains the given query box or
    /// [`None`] if there is no such chunk. If several chunks qualify, the one
    /// with the smallest coverage wins (ties broken by locator).
    pub fn query(&self, query: &BoundingBox) -> Option<&Chunk> {
        self.tree
            .locate_in_envelope_intersecting(&query.envelope())
            .filter(|chunk| chunk.coverage().contains(query))
            .min_by(|a, b| {
                coverage_area(a)
                    .total_cmp(&coverage_area(b))
                    .then_with(|| a.locator().cmp(b.locator()))
            })
    }

    /// Iterates over all registered chunks in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.tree.iter()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn coverage_area(chunk: &Chunk) -> f64 {
    let c = chunk.coverage();
    (c.east() - c.west()) * (c.north() - c.south())
}

impl FromIterator<Chunk> for GeoIndex {
    fn from_iter<T: IntoIterator<Item = Chunk>>(iter: T) -> Self {
        Self::bulk_load(iter.into_iter().collect())
    }
}
