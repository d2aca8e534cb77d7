use std::{io::BufRead, str::FromStr};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    input::{Elements, WayElement},
    model::{BoundingBox, GeoCoordinate, Member, Relation, Role, Tags, Way},
};

/// Errors raised while reading an OSM XML document
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("malformed XML at byte {position}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("element `{element}' at byte {position} is missing attribute `{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        position: usize,
    },

    #[error("element `{element}' at byte {position} has invalid attribute `{attribute}': `{value}'")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
        position: usize,
    },
}

/// An element whose child tags are still being read
enum Pending {
    Node {
        id: i64,
        coordinate: GeoCoordinate,
    },
    Way {
        id: i64,
        refs: Vec<i64>,
        tags: Tags,
    },
    Relation {
        id: i64,
        members: Vec<(String, i64)>,
        tags: Tags,
    },
}

/// A way whose node references have not been resolved yet
struct RawWay {
    id: i64,
    refs: Vec<i64>,
    tags: Tags,
}

/// A relation whose way members have not been resolved yet
struct RawRelation {
    id: i64,
    members: Vec<(String, i64)>,
    tags: Tags,
}

/// Collects OSM elements while XML events are read
#[derive(Default)]
struct OsmCollector {
    pending: Option<Pending>,
    bounds: Option<BoundingBox>,
    nodes: FxHashMap<i64, GeoCoordinate>,
    ways: Vec<RawWay>,
    relations: Vec<RawRelation>,
}

fn attribute(e: &BytesStart, name: &str, position: usize) -> Result<Option<String>, ReadError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| ReadError::Xml {
            position,
            source: err.into(),
        })?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|source| ReadError::Xml { position, source })?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn required<T: FromStr>(
    e: &BytesStart,
    element: &'static str,
    name: &'static str,
    position: usize,
) -> Result<T, ReadError> {
    let value = attribute(e, name, position)?.ok_or(ReadError::MissingAttribute {
        element,
        attribute: name,
        position,
    })?;
    match value.parse() {
        Ok(v) => Ok(v),
        Err(_) => Err(ReadError::InvalidAttribute {
            element,
            attribute: name,
            value,
            position,
        }),
    }
}

fn required_coordinate(
    e: &BytesStart,
    element: &'static str,
    lat: &'static str,
    lon: &'static str,
    position: usize,
) -> Result<GeoCoordinate, ReadError> {
    let latitude: f64 = required(e, element, lat, position)?;
    let longitude: f64 = required(e, element, lon, position)?;
    for (name, value) in [(lat, latitude), (lon, longitude)] {
        if !value.is_finite() {
            return Err(ReadError::InvalidAttribute {
                element,
                attribute: name,
                value: value.to_string(),
                position,
            });
        }
    }
    Ok(GeoCoordinate::new(latitude, longitude))
}

impl OsmCollector {
    fn on_start(&mut self, e: &BytesStart, position: usize, empty: bool) -> Result<(), ReadError> {
        match e.local_name().as_ref() {
            b"bounds" => {
                let min = required_coordinate(e, "bounds", "minlat", "minlon", position)?;
                let max = required_coordinate(e, "bounds", "maxlat", "maxlon", position)?;
                self.bounds = Some(BoundingBox::new(min, max));
            }

            b"node" => {
                let id = required(e, "node", "id", position)?;
                let coordinate = required_coordinate(e, "node", "lat", "lon", position)?;
                self.pending = Some(Pending::Node { id, coordinate });
            }

            b"way" => {
                let id = required(e, "way", "id", position)?;
                self.pending = Some(Pending::Way {
                    id,
                    refs: Vec::new(),
                    tags: Tags::new(),
                });
            }

            b"relation" => {
                let id = required(e, "relation", "id", position)?;
                self.pending = Some(Pending::Relation {
                    id,
                    members: Vec::new(),
                    tags: Tags::new(),
                });
            }

            b"nd" => {
                if let Some(Pending::Way { refs, .. }) = &mut self.pending {
                    refs.push(required(e, "nd", "ref", position)?);
                }
            }

            b"member" => {
                if let Some(Pending::Relation { members, .. }) = &mut self.pending {
                    // only way members carry geometry
                    if attribute(e, "type", position)?.as_deref() == Some("way") {
                        let role = attribute(e, "role", position)?.unwrap_or_default();
                        members.push((role, required(e, "member", "ref", position)?));
                    }
                }
            }

            b"tag" => match &mut self.pending {
                Some(Pending::Way { tags, .. }) | Some(Pending::Relation { tags, .. }) => {
                    let k = required(e, "tag", "k", position)?;
                    let v = required(e, "tag", "v", position)?;
                    tags.insert(k, v);
                }
                _ => {}
            },

            _ => {}
        }

        if empty {
            self.on_end(e.local_name().as_ref());
        }

        Ok(())
    }

    fn on_end(&mut self, local_name: &[u8]) {
        if !matches!(local_name, b"node" | b"way" | b"relation") {
            return;
        }
        match self.pending.take() {
            Some(Pending::Node { id, coordinate }) => {
                self.nodes.insert(id, coordinate);
            }
            Some(Pending::Way { id, refs, tags }) => self.ways.push(RawWay { id, refs, tags }),
            Some(Pending::Relation { id, members, tags }) => {
                self.relations.push(RawRelation { id, members, tags })
            }
            None => {}
        }
    }

    /// Resolves node references and relation members
    fn finish(self) -> Elements {
        let nodes = self.nodes;

        let mut ways = Vec::with_capacity(self.ways.len());
        let mut way_positions = FxHashMap::default();
        for raw in self.ways {
            let coordinates = raw
                .refs
                .iter()
                .filter_map(|r| nodes.get(r))
                .copied()
                .collect::<Vec<_>>();
            if coordinates.len() < 2 {
                debug!(way = raw.id, "dropping way with less than two known nodes");
                continue;
            }
            way_positions.insert(raw.id, ways.len());
            ways.push(WayElement {
                id: raw.id,
                tags: raw.tags,
                way: Way::new(coordinates),
            });
        }

        let relations = self
            .relations
            .into_iter()
            .map(|raw| {
                let members = raw
                    .members
                    .into_iter()
                    .filter_map(|(role, r)| match way_positions.get(&r) {
                        Some(&i) => Some(Member::new(Role::from(role.as_str()), ways[i].way.clone())),
                        None => {
                            debug!(relation = raw.id, way = r, "skipping unknown member way");
                            None
                        }
                    })
                    .collect();
                Relation {
                    id: raw.id,
                    tags: raw.tags,
                    members,
                }
            })
            .collect();

        Elements {
            bounds: self.bounds,
            nodes,
            ways,
            relations,
        }
    }
}

/// Reads an OSM XML document (`<osm>` with `node`, `way`, and `relation`
/// elements) and resolves it into [`Elements`]
pub fn read_osm_xml<R: BufRead>(input: R) -> Result<Elements, ReadError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut collector = OsmCollector::default();
    let mut buf = Vec::new();
    loop {
        let position = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Err(source) => return Err(ReadError::Xml { position, source }),
            Ok(Event::Start(e)) => collector.on_start(&e, position, false)?,
            Ok(Event::Empty(e)) => collector.on_start(&e, position, true)?,
            Ok(Event::End(e)) => collector.on_end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Ok(_) => {}
        }
        buf.clear();
    }

    Ok(collector.finish())
}
