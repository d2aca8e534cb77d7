mod osm_reader;

pub use osm_reader::{read_osm_xml, ReadError};
