use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;
use ulid::Ulid;

use crate::{
    index::Chunk,
    input::xml::ReadError,
    model::{BoundingBox, Relation},
};

pub use self::memory::MemoryElementSource;
pub use self::xml::XmlSourceBuilder;

pub mod memory;
pub mod xml;

/// Element counts of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceStats {
    pub nodes: usize,
    pub ways: usize,
    pub relations: usize,
}

/// Errors raised by queries against an [`ElementSource`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("element source {0} has already been released")]
    Released(Ulid),
}

/// Errors raised while turning a chunk or a payload into an [`ElementSource`]
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("unable to read chunk data from `{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported data format `{0}'")]
    UnsupportedFormat(String),

    #[error("unable to parse data")]
    Parse(#[from] ReadError),
}

/// A queryable handle over a chunk's parsed content.
///
/// Sources are shared through [`Arc`]s. The cache that created a source owns
/// it and calls [`ElementSource::release`] when the source is superseded or
/// disposed. Queries against a released source fail with
/// [`SourceError::Released`].
pub trait ElementSource: Send + Sync {
    /// A unique identifier. Two handles with the same identifier refer to the
    /// same source.
    fn id(&self) -> Ulid;

    /// The area covered by the source, if known
    fn coverage(&self) -> Option<BoundingBox>;

    /// Returns all relations with at least one member inside `query`
    fn relations(&self, query: &BoundingBox) -> Result<Vec<Relation>, SourceError>;

    /// Returns all relations carrying the tag `key=value`
    fn relations_by_tag(&self, key: &str, value: &str) -> Result<Vec<Relation>, SourceError>;

    fn stats(&self) -> Result<SourceStats, SourceError>;

    /// Frees the source's content. Calling this more than once has no further
    /// effect.
    fn release(&self);

    fn is_released(&self) -> bool;
}

/// Creates element sources from local chunks or from fetched payloads
pub trait SourceBuilder: Send + Sync {
    /// Loads the source for a chunk registered in the index
    fn load(&self, chunk: &Chunk) -> Result<Arc<dyn ElementSource>, BuildError>;

    /// Builds a source from raw bytes in the given format
    fn build(&self, format: &str, bytes: &[u8]) -> Result<Arc<dyn ElementSource>, BuildError>;
}
