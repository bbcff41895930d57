//! Bounding-extent value types.
//!
//! Both types default to an explicitly inverted sentinel (min above max)
//! so that "no data seen yet" is distinguishable from any real extent.
//! Callers must check [`BoundingExtents3D::is_valid`] before using a
//! computed extent.

/// Axis-aligned world-space bounding box.
///
/// The planar (x/y) and elevation (z) axes are tracked independently:
/// sources that know nothing about elevation (such as an existence map)
/// populate only the plan axes and leave z inverted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingExtents3D {
    /// Minimum easting.
    pub min_x: f64,
    /// Minimum northing.
    pub min_y: f64,
    /// Minimum elevation.
    pub min_z: f64,
    /// Maximum easting.
    pub max_x: f64,
    /// Maximum northing.
    pub max_y: f64,
    /// Maximum elevation.
    pub max_z: f64,
}

impl BoundingExtents3D {
    /// The inverted "no data" sentinel.
    pub const fn inverted() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            min_z: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
            max_z: f64::MIN,
        }
    }

    /// Whether the plan (x/y) extent encloses at least one point.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Whether the elevation range encloses at least one value.
    pub fn has_elevation(&self) -> bool {
        self.min_z <= self.max_z
    }

    /// Grow the plan extent to include a point.
    pub fn include_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    /// Grow the elevation range to include a value.
    pub fn include_elevation(&mut self, z: f64) {
        self.min_z = self.min_z.min(z);
        self.max_z = self.max_z.max(z);
    }

    /// Grow this extent to the union with another.
    pub fn include_extents(&mut self, other: &BoundingExtents3D) {
        if other.is_valid() {
            self.include_point(other.min_x, other.min_y);
            self.include_point(other.max_x, other.max_y);
        }
        if other.has_elevation() {
            self.include_elevation(other.min_z);
            self.include_elevation(other.max_z);
        }
    }

    /// Whether two plan extents overlap. Inverted extents overlap nothing.
    pub fn intersects(&self, other: &BoundingExtents3D) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Plan width, or a negative value for the inverted sentinel.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Plan height, or a negative value for the inverted sentinel.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl Default for BoundingExtents3D {
    fn default() -> Self {
        Self::inverted()
    }
}

/// Axis-aligned bounding box in integer tree-address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingIntegerExtents2D {
    /// Minimum x address.
    pub min_x: i64,
    /// Minimum y address.
    pub min_y: i64,
    /// Maximum x address.
    pub max_x: i64,
    /// Maximum y address.
    pub max_y: i64,
}

impl BoundingIntegerExtents2D {
    /// The inverted "no data" sentinel.
    pub const fn inverted() -> Self {
        Self {
            min_x: i64::MAX,
            min_y: i64::MAX,
            max_x: i64::MIN,
            max_y: i64::MIN,
        }
    }

    /// Whether the extent encloses at least one cell.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Grow the extent to include a cell.
    pub fn include(&mut self, x: i64, y: i64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }
}

impl Default for BoundingIntegerExtents2D {
    fn default() -> Self {
        Self::inverted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_extent_is_not_valid() {
        let e = BoundingExtents3D::inverted();
        assert!(!e.is_valid());
        assert!(!e.has_elevation());
    }

    #[test]
    fn single_point_extent() {
        let mut e = BoundingExtents3D::inverted();
        e.include_point(3.0, -2.0);
        assert!(e.is_valid());
        assert_eq!(e.width(), 0.0);
        assert_eq!(e.height(), 0.0);
        assert!(!e.has_elevation(), "plan points do not populate z");
    }

    #[test]
    fn union_with_inverted_is_identity() {
        let mut e = BoundingExtents3D::inverted();
        e.include_point(0.0, 0.0);
        e.include_point(10.0, 5.0);
        let before = e;
        e.include_extents(&BoundingExtents3D::inverted());
        assert_eq!(e, before);
    }

    #[test]
    fn intersects_requires_overlap_on_both_axes() {
        let mut a = BoundingExtents3D::inverted();
        a.include_point(0.0, 0.0);
        a.include_point(10.0, 10.0);
        let mut b = BoundingExtents3D::inverted();
        b.include_point(5.0, 5.0);
        b.include_point(15.0, 15.0);
        let mut c = BoundingExtents3D::inverted();
        c.include_point(11.0, 0.0);
        c.include_point(20.0, 10.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&BoundingExtents3D::inverted()));
    }

    #[test]
    fn integer_extents_track_bounds() {
        let mut e = BoundingIntegerExtents2D::inverted();
        assert!(!e.is_valid());
        e.include(5, 7);
        e.include(-3, 9);
        assert_eq!(e.min_x, -3);
        assert_eq!(e.max_x, 5);
        assert_eq!(e.min_y, 7);
        assert_eq!(e.max_y, 9);
    }
}
