use std::{fs::File, io::BufReader, sync::Arc};

use tracing::info;

use crate::{index::Chunk, input::xml::read_osm_xml};

use super::{BuildError, ElementSource, MemoryElementSource, SourceBuilder};

/// Default name of the data file inside a chunk directory
pub const DEFAULT_DATA_FILE_NAME: &str = "data.osm";

/// Builds [`MemoryElementSource`]s from OSM XML, either from the data file of
/// a local chunk or from a fetched payload
pub struct XmlSourceBuilder {
    data_file_name: String,
}

impl XmlSourceBuilder {
    pub fn new(data_file_name: impl Into<String>) -> Self {
        Self {
            data_file_name: data_file_name.into(),
        }
    }
}

impl Default for XmlSourceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_FILE_NAME)
    }
}

impl SourceBuilder for XmlSourceBuilder {
    fn load(&self, chunk: &Chunk) -> Result<Arc<dyn ElementSource>, BuildError> {
        let path = chunk.locator().join(&self.data_file_name);
        let file = File::open(&path).map_err(|source| BuildError::Io {
            path: path.clone(),
            source,
        })?;
        let elements = read_osm_xml(BufReader::new(file))?;
        let source = MemoryElementSource::new(elements);
        info!(path = %path.display(), id = %source.id(), "loaded chunk");
        Ok(Arc::new(source))
    }

    fn build(&self, format: &str, bytes: &[u8]) -> Result<Arc<dyn ElementSource>, BuildError> {
        if !format.eq_ignore_ascii_case("xml") {
            return Err(BuildError::UnsupportedFormat(format.to_string()));
        }
        let elements = read_osm_xml(bytes)?;
        let source = MemoryElementSource::new(elements);
        info!(bytes = bytes.len(), id = %source.id(), "built element source from payload");
        Ok(Arc::new(source))
    }
}
