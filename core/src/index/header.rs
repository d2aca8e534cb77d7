//! Discovery of local chunks. Every chunk directory contains a header file
//! whose first line describes the chunk's coverage as two coordinates
//! `lat,lon lat,lon` (minimum and maximum corner).

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{BoundingBox, GeoCoordinate};

use super::Chunk;

/// Default name of a chunk header file
pub const DEFAULT_HEADER_FILE_NAME: &str = "header.txt";

/// Errors raised while reading a single chunk header
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("unable to read header")]
    Io(#[from] io::Error),

    #[error("header is empty")]
    Empty,

    #[error("header must contain two coordinates, found `{0}'")]
    MissingCoordinate(String),

    #[error("invalid coordinate `{0}'")]
    InvalidCoordinate(String),
}

fn coordinate_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^([-+]?\d{1,2}(?:[.]\d+)?),([-+]?\d{1,3}(?:[.]\d+)?)$")
            .expect("coordinate regex must be valid")
    })
}

fn parse_coordinate(s: &str) -> Result<GeoCoordinate, HeaderError> {
    let invalid = || HeaderError::InvalidCoordinate(s.to_string());
    let captures = coordinate_regex().captures(s).ok_or_else(invalid)?;
    let latitude = captures[1].parse::<f64>().map_err(|_| invalid())?;
    let longitude = captures[2].parse::<f64>().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(GeoCoordinate::new(latitude, longitude))
}

/// Parses the contents of a header file into the chunk's coverage box
pub fn parse_header(contents: &str) -> Result<BoundingBox, HeaderError> {
    let line = contents
        .lines()
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or(HeaderError::Empty)?;
    let (min, max) = line
        .split_whitespace()
        .next_tuple()
        .ok_or_else(|| HeaderError::MissingCoordinate(line.to_string()))?;
    Ok(BoundingBox::new(
        parse_coordinate(min)?,
        parse_coordinate(max)?,
    ))
}

/// Reads the header file at the given path
pub fn read_header(path: &Path) -> Result<BoundingBox, HeaderError> {
    let contents = fs::read_to_string(path)?;
    parse_header(&contents)
}

/// Recursively scans `root` for files named `header_file_name` and returns a
/// chunk for every valid header found. The chunk's locator is the directory
/// containing the header. Malformed headers are logged and skipped. Fails only
/// if `root` itself cannot be read.
pub fn discover_chunks(root: &Path, header_file_name: &str) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let entries = fs::read_dir(root)
        .with_context(|| format!("Unable to read chunk directory `{}'", root.display()))?;
    scan_directory(entries, root, header_file_name, &mut chunks);
    info!(root = %root.display(), chunks = chunks.len(), "discovered local chunks");
    Ok(chunks)
}

fn scan_directory(
    entries: fs::ReadDir,
    dir: &Path,
    header_file_name: &str,
    chunks: &mut Vec<Chunk>,
) {
    let mut subdirs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), %err, "unable to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        // symlinked directories are not followed so cycles cannot recurse
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!(entry = %path.display(), %err, "unable to determine file type");
                continue;
            }
        };
        if file_type.is_dir() {
            subdirs.push(path);
        } else if entry.file_name() == header_file_name {
            match read_header(&path) {
                Ok(coverage) => {
                    debug!(header = %path.display(), %coverage, "registering chunk");
                    chunks.push(Chunk::new(dir, coverage));
                }
                Err(err) => {
                    warn!(header = %path.display(), %err, "skipping chunk with malformed header");
                }
            }
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        match fs::read_dir(&subdir) {
            Ok(entries) => scan_directory(entries, &subdir, header_file_name, chunks),
            Err(err) => warn!(dir = %subdir.display(), %err, "unable to read directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use assertor::{assert_that, EqualityAssertion, VecAssertion};
    use tempdir::TempDir;

    use crate::model::{BoundingBox, GeoCoordinate};

    use super::{discover_chunks, parse_header, HeaderError, DEFAULT_HEADER_FILE_NAME};

    fn write_chunk(root: &Path, name: &str, header: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(DEFAULT_HEADER_FILE_NAME), header).unwrap();
    }

    #[test]
    fn parse_valid_header() {
        let bb = parse_header("52.4,13.3 52.6,13.5\nignored").unwrap();
        assert_that!(bb).is_equal_to(BoundingBox::new(
            GeoCoordinate::new(52.4, 13.3),
            GeoCoordinate::new(52.6, 13.5),
        ));

        let bb = parse_header("-33.9,-151.2 -33.8,-151.1").unwrap();
        assert_that!(bb.south()).is_equal_to(-33.9);
        assert_that!(bb.west()).is_equal_to(-151.2);
    }

    #[test]
    fn parse_invalid_headers() {
        assert!(matches!(parse_header(""), Err(HeaderError::Empty)));
        assert!(matches!(
            parse_header("52.4,13.3"),
            Err(HeaderError::MissingCoordinate(_))
        ));
        assert!(matches!(
            parse_header("52.4,13.3 north,east"),
            Err(HeaderError::InvalidCoordinate(_))
        ));
        assert!(parse_header("hello world").is_err());
    }

    #[test]
    fn discover_nested_chunks() {
        let dir = TempDir::new("geochunk_discover").unwrap();
        write_chunk(dir.path(), "berlin", "52.4,13.3 52.6,13.5");
        write_chunk(dir.path(), "europe/moscow", "55.5,37.3 55.9,37.9");
        fs::write(dir.path().join("README"), "not a header").unwrap();

        let mut chunks = discover_chunks(dir.path(), DEFAULT_HEADER_FILE_NAME).unwrap();
        chunks.sort_by(|a, b| a.locator().cmp(b.locator()));
        assert_that!(chunks).has_length(2);
        assert_that!(chunks[0].locator().to_path_buf()).is_equal_to(dir.path().join("berlin"));
        assert_that!(chunks[1].locator().to_path_buf())
            .is_equal_to(dir.path().join("europe/moscow"));
    }

    #[test]
    fn malformed_header_does_not_abort_scan() {
        let dir = TempDir::new("geochunk_discover").unwrap();
        write_chunk(dir.path(), "good", "52.4,13.3 52.6,13.5");
        write_chunk(dir.path(), "bad", "this is not a header");
        write_chunk(dir.path(), "empty", "");

        let chunks = discover_chunks(dir.path(), DEFAULT_HEADER_FILE_NAME).unwrap();
        assert_that!(chunks).has_length(1);
        assert_that!(chunks[0].locator().to_path_buf()).is_equal_to(dir.path().join("good"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new("geochunk_discover").unwrap();
        assert!(discover_chunks(&dir.path().join("missing"), DEFAULT_HEADER_FILE_NAME).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new("geochunk_discover").unwrap();
        write_chunk(dir.path(), "berlin", "52.4,13.3 52.6,13.5");
        write_chunk(dir.path(), "europe/moscow", "55.5,37.3 55.9,37.9");
        // cycle back to the root and a second path to an existing chunk
        symlink(dir.path(), dir.path().join("europe/loop")).unwrap();
        symlink(dir.path().join("berlin"), dir.path().join("berlin2")).unwrap();

        let mut chunks = discover_chunks(dir.path(), DEFAULT_HEADER_FILE_NAME).unwrap();
        chunks.sort_by(|a, b| a.locator().cmp(b.locator()));
        assert_that!(chunks).has_length(2);
        assert_that!(chunks[0].locator().to_path_buf()).is_equal_to(dir.path().join("berlin"));
        assert_that!(chunks[1].locator().to_path_buf())
            .is_equal_to(dir.path().join("europe/moscow"));
    }
}
