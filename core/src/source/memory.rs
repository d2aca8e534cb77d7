use parking_lot::RwLock;
use tracing::debug;
use ulid::Ulid;

use crate::{
    input::Elements,
    model::{BoundingBox, Relation},
    util::extend_bbox::bounding_box_of,
};

use super::{ElementSource, SourceError, SourceStats};

struct Content {
    stats: SourceStats,

    /// Relations together with the box around all their member ways
    relations: Vec<(Option<BoundingBox>, Relation)>,
}

/// An [`ElementSource`] that keeps all elements in memory
pub struct MemoryElementSource {
    id: Ulid,
    coverage: Option<BoundingBox>,

    /// [`None`] after the source has been released
    content: RwLock<Option<Content>>,
}

impl MemoryElementSource {
    pub fn new(elements: Elements) -> Self {
        let coverage = elements
            .bounds
            .or_else(|| bounding_box_of(elements.nodes.values()));
        let stats = SourceStats {
            nodes: elements.nodes.len(),
            ways: elements.ways.len(),
            relations: elements.relations.len(),
        };
        let relations = elements
            .relations
            .into_iter()
            .map(|r| (bounding_box_of(r.coordinates()), r))
            .collect();

        Self {
            id: Ulid::new(),
            coverage,
            content: RwLock::new(Some(Content { stats, relations })),
        }
    }

    fn with_content<T>(&self, f: impl FnOnce(&Content) -> T) -> Result<T, SourceError> {
        let content = self.content.read();
        content.as_ref().map(f).ok_or(SourceError::Released(self.id))
    }
}

impl ElementSource for MemoryElementSource {
    fn id(&self) -> Ulid {
        self.id
    }

    fn coverage(&self) -> Option<BoundingBox> {
        self.coverage
    }

    fn relations(&self, query: &BoundingBox) -> Result<Vec<Relation>, SourceError> {
        self.with_content(|c| {
            c.relations
                .iter()
                .filter(|(bb, _)| bb.is_some_and(|bb| bb.intersects(query)))
                .map(|(_, r)| r.clone())
                .collect()
        })
    }

    fn relations_by_tag(&self, key: &str, value: &str) -> Result<Vec<Relation>, SourceError> {
        self.with_content(|c| {
            c.relations
                .iter()
                .filter(|(_, r)| r.tag(key) == Some(value))
                .map(|(_, r)| r.clone())
                .collect()
        })
    }

    fn stats(&self) -> Result<SourceStats, SourceError> {
        self.with_content(|c| c.stats)
    }

    fn release(&self) {
        if self.content.write().take().is_some() {
            debug!(id = %self.id, "released element source");
        }
    }

    fn is_released(&self) -> bool {
        self.content.read().is_none()
    }
}
