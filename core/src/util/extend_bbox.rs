use crate::model::{BoundingBox, GeoCoordinate};

/// Trait to grow bounding boxes
///
/// # Examples
///
/// ```rust
/// use geochunk_core::model::{BoundingBox, GeoCoordinate};
/// use geochunk_core::util::extend_bbox::ExtendBoundingBox;
///
/// let mut bb = BoundingBox::from_coordinate(GeoCoordinate::new(2.0, 1.0));
/// assert_eq!(bb.west(), 1.0);
/// assert_eq!(bb.south(), 2.0);
/// assert_eq!(bb.east(), 1.0);
/// assert_eq!(bb.north(), 2.0);
///
/// bb.extend_coordinate(&GeoCoordinate::new(6.0, 5.0));
/// assert_eq!(bb.west(), 1.0);
/// assert_eq!(bb.south(), 2.0);
/// assert_eq!(bb.east(), 5.0);
/// assert_eq!(bb.north(), 6.0);
///
/// bb.extend_coordinate(&GeoCoordinate::new(-6.0, -7.0));
/// assert_eq!(bb.west(), -7.0);
/// assert_eq!(bb.south(), -6.0);
/// assert_eq!(bb.east(), 5.0);
/// assert_eq!(bb.north(), 6.0);
/// ```
///
/// ```rust
/// use geochunk_core::model::BoundingBox;
/// use geochunk_core::util::extend_bbox::ExtendBoundingBox;
///
/// let mut bb1 = BoundingBox::from_bounds(1.0, 2.0, 4.0, 5.0);
/// let mut bb2 = BoundingBox::from_bounds(40.0, 50.0, 70.0, 80.0);
///
/// bb1.extend_box(&bb2);
/// assert_eq!(bb1, BoundingBox::from_bounds(1.0, 2.0, 70.0, 80.0));
///
/// bb2.extend_box(&bb1);
/// assert_eq!(bb2, BoundingBox::from_bounds(1.0, 2.0, 70.0, 80.0));
/// ```
pub trait ExtendBoundingBox {
    /// Extends the box so it covers the given coordinate
    fn extend_coordinate(&mut self, c: &GeoCoordinate);

    /// Extends the box so it covers the given other box
    fn extend_box(&mut self, other: &BoundingBox);
}

impl ExtendBoundingBox for BoundingBox {
    fn extend_coordinate(&mut self, c: &GeoCoordinate) {
        let min = self.min();
        self.set_min(GeoCoordinate::new(
            min.latitude.min(c.latitude),
            min.longitude.min(c.longitude),
        ));
        let max = self.max();
        self.set_max(GeoCoordinate::new(
            max.latitude.max(c.latitude),
            max.longitude.max(c.longitude),
        ));
    }

    fn extend_box(&mut self, other: &BoundingBox) {
        self.extend_coordinate(&other.min());
        self.extend_coordinate(&other.max());
    }
}

/// Computes the smallest box covering all given coordinates or [`None`] if
/// there are none
pub fn bounding_box_of<'a, I>(coordinates: I) -> Option<BoundingBox>
where
    I: IntoIterator<Item = &'a GeoCoordinate>,
{
    let mut iter = coordinates.into_iter();
    let mut result = BoundingBox::from_coordinate(*iter.next()?);
    for c in iter {
        result.extend_coordinate(c);
    }
    Some(result)
}
