use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

use crate::model::BoundingBox;

pub use self::http::ReqwestFetcher;

pub mod http;

/// Errors raised while fetching remote data
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("unable to create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request to `{url}' failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from `{url}'")]
    Status { url: String, status: u16 },

    #[error("unable to read response body from `{url}'")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Fetches raw bytes from a URL. Calls block until the response has been
/// read completely.
pub trait Fetcher: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Errors raised while parsing a [`QueryTemplate`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}' (expected `{{0}}' to `{{3}}')")]
    UnknownPlaceholder(String),

    #[error("unclosed placeholder starting at {0}")]
    Unclosed(usize),

    #[error("placeholder `{{{0}}}' is missing")]
    MissingPlaceholder(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Bound(usize),
}

/// A query string template with the positional placeholders `{0}` to `{3}`,
/// which are replaced by a box's west, south, east, and north bounds.
///
/// ```rust
/// use geochunk_core::model::BoundingBox;
/// use geochunk_core::remote::QueryTemplate;
///
/// let template: QueryTemplate = "bbox={0},{1},{2},{3}".parse().unwrap();
/// let bb = BoundingBox::from_bounds(13.4, 52.5, 13.5, 52.6);
/// assert_eq!(template.format(&bb), "bbox=13.4,52.5,13.5,52.6");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pieces: Vec<Piece>,
}

impl FromStr for QueryTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pieces = Vec::new();
        let mut seen = [false; 4];
        let mut rest = s;
        let mut offset = 0;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                pieces.push(Piece::Literal(rest[..open].to_string()));
            }
            let close = rest[open..]
                .find('}')
                .ok_or(TemplateError::Unclosed(offset + open))?;
            let name = &rest[open + 1..open + close];
            let i = match name.parse::<usize>() {
                Ok(i) if i < 4 => i,
                _ => return Err(TemplateError::UnknownPlaceholder(name.to_string())),
            };
            seen[i] = true;
            pieces.push(Piece::Bound(i));
            offset += open + close + 1;
            rest = &rest[open + close + 1..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Literal(rest.to_string()));
        }

        match seen.iter().position(|s| !s) {
            Some(missing) => Err(TemplateError::MissingPlaceholder(missing)),
            None => Ok(Self { pieces }),
        }
    }
}

impl QueryTemplate {
    /// Substitutes the bounds of `bbox` into the template
    pub fn format(&self, bbox: &BoundingBox) -> String {
        let bounds = [bbox.west(), bbox.south(), bbox.east(), bbox.north()];
        let mut result = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => result.push_str(s),
                Piece::Bound(i) => result.push_str(&bounds[*i].to_string()),
            }
        }
        result
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => f.write_str(s)?,
                Piece::Bound(i) => write!(f, "{{{i}}}")?,
            }
        }
        Ok(())
    }
}

/// Fetches data for boxes not covered by any local chunk. The payload is
/// turned into an element source by whoever holds a [`SourceBuilder`], using
/// [`RemoteLoader::format`].
///
/// [`SourceBuilder`]: crate::source::SourceBuilder
pub struct RemoteLoader {
    server: String,
    template: QueryTemplate,
    format: String,
    fetcher: Box<dyn Fetcher>,
}

impl RemoteLoader {
    /// Creates a loader that requests `server` followed by the escaped query
    /// string built from `template`. `format` names the payload's format.
    pub fn new(
        server: impl Into<String>,
        template: QueryTemplate,
        format: impl Into<String>,
        fetcher: Box<dyn Fetcher>,
    ) -> Self {
        Self {
            server: server.into(),
            template,
            format: format.into(),
            fetcher,
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// The URL requested for the given box
    pub fn url_for(&self, bbox: &BoundingBox) -> String {
        let query = self.template.format(bbox);
        format!("{}{}", self.server, urlencoding::encode(&query))
    }

    /// Fetches the raw payload for the given box
    pub fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(bbox);
        warn!(query = %bbox, %url, "no local element source found, fetching remote data");
        let bytes = self.fetcher.get(&url)?;
        info!(bytes = bytes.len(), %url, "received remote data");
        Ok(bytes)
    }
}
