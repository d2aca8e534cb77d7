use std::{fmt, str::FromStr};

use geo::{coord, Coord, Rect};
use rstar::AABB;
use thiserror::Error;

pub use self::relation::{Member, Relation, Role, Tags, Way};

pub mod relation;

/// A WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Converts the coordinate to a planar `geo` coordinate (x = longitude,
    /// y = latitude)
    pub fn to_coord(self) -> Coord {
        coord! { x: self.longitude, y: self.latitude }
    }
}

impl From<GeoCoordinate> for Coord {
    fn from(value: GeoCoordinate) -> Self {
        value.to_coord()
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// An axis-aligned box between two coordinates. The minimum corner always
/// holds the smaller latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: GeoCoordinate,
    max: GeoCoordinate,
}

impl BoundingBox {
    /// Creates a box spanning the two given corners in any order
    pub fn new(a: GeoCoordinate, b: GeoCoordinate) -> Self {
        Self {
            min: GeoCoordinate::new(a.latitude.min(b.latitude), a.longitude.min(b.longitude)),
            max: GeoCoordinate::new(a.latitude.max(b.latitude), a.longitude.max(b.longitude)),
        }
    }

    /// Creates a box from its west, south, east, and north bounds
    pub fn from_bounds(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            GeoCoordinate::new(south, west),
            GeoCoordinate::new(north, east),
        )
    }

    /// Creates a degenerate box covering exactly one coordinate
    pub fn from_coordinate(c: GeoCoordinate) -> Self {
        Self { min: c, max: c }
    }

    pub fn min(&self) -> GeoCoordinate {
        self.min
    }

    pub fn max(&self) -> GeoCoordinate {
        self.max
    }

    pub fn west(&self) -> f64 {
        self.min.longitude
    }

    pub fn south(&self) -> f64 {
        self.min.latitude
    }

    pub fn east(&self) -> f64 {
        self.max.longitude
    }

    pub fn north(&self) -> f64 {
        self.max.latitude
    }

    pub(crate) fn set_min(&mut self, min: GeoCoordinate) {
        self.min = min;
    }

    pub(crate) fn set_max(&mut self, max: GeoCoordinate) {
        self.max = max;
    }

    /// Returns `true` if `other` lies completely inside this box (touching
    /// borders included)
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min.latitude <= other.min.latitude
            && self.min.longitude <= other.min.longitude
            && self.max.latitude >= other.max.latitude
            && self.max.longitude >= other.max.longitude
    }

    pub fn contains_coordinate(&self, c: &GeoCoordinate) -> bool {
        (self.min.latitude..=self.max.latitude).contains(&c.latitude)
            && (self.min.longitude..=self.max.longitude).contains(&c.longitude)
    }

    /// Returns `true` if the two boxes share at least one point
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.latitude <= other.max.latitude
            && other.min.latitude <= self.max.latitude
            && self.min.longitude <= other.max.longitude
            && other.min.longitude <= self.max.longitude
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.min.to_coord(), self.max.to_coord())
    }

    /// The R-tree envelope of this box in `[x, y]` (longitude, latitude) order
    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners(
            [self.min.longitude, self.min.latitude],
            [self.max.longitude, self.max.latitude],
        )
    }
}

/// Formats the box as `west,south,east,north`
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.west(),
            self.south(),
            self.east(),
            self.north()
        )
    }
}

/// Errors raised while parsing a `west,south,east,north` string
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseBoundingBoxError {
    /// A bound could not be parsed as a number
    #[error("invalid number")]
    InvalidNumber { start: usize, end: usize },

    /// The string did not contain exactly four bounds
    #[error("expected 4 comma-separated bounds, found {found}")]
    WrongComponentCount { found: usize },
}

impl FromStr for BoundingBox {
    type Err = ParseBoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bounds = Vec::with_capacity(4);
        let mut start = 0;
        for part in s.split(',') {
            let end = start + part.len();
            let trimmed = part.trim();
            let value = trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or(ParseBoundingBoxError::InvalidNumber { start, end })?;
            bounds.push(value);
            start = end + 1;
        }

        match bounds[..] {
            [west, south, east, north] => Ok(Self::from_bounds(west, south, east, north)),
            _ => Err(ParseBoundingBoxError::WrongComponentCount {
                found: bounds.len(),
            }),
        }
    }
}
