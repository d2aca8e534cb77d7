use std::path::{Path, PathBuf};

use rstar::{RTreeObject, AABB};

use crate::model::BoundingBox;

/// A spatially bounded unit of pre-processed data that can be loaded as a
/// whole
#[derive(PartialEq, Debug, Clone)]
pub struct Chunk {
    /// Where the chunk's data lives (the directory containing its header)
    locator: PathBuf,

    /// The area covered by the chunk
    coverage: BoundingBox,
}

impl Chunk {
    /// Create a new chunk with the given locator and coverage
    pub fn new(locator: impl Into<PathBuf>, coverage: BoundingBox) -> Self {
        Self {
            locator: locator.into(),
            coverage,
        }
    }

    pub fn locator(&self) -> &Path {
        &self.locator
    }

    pub fn coverage(&self) -> &BoundingBox {
        &self.coverage
    }
}

impl RTreeObject for Chunk {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.coverage.envelope()
    }
}
