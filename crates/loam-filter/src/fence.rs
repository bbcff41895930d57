//! Polygonal boundary fences.
//!
//! A fence is a closed polygon in grid world coordinates. Containment
//! uses the even-odd crossing rule, so self-intersecting fences behave
//! the way survey packages expect. A cached bounding rectangle rejects
//! most points before the per-edge walk runs.

use smallvec::SmallVec;

use crate::error::FilterError;

/// One fence vertex in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FencePoint {
    /// World X.
    pub x: f64,
    /// World Y.
    pub y: f64,
}

/// A closed polygonal boundary.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Clone, Debug, PartialEq)]
pub struct Fence {
    points: SmallVec<[FencePoint; 8]>,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Fence {
    /// Build a fence from at least three vertices.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, FilterError> {
        let points: SmallVec<[FencePoint; 8]> = points
            .into_iter()
            .map(|(x, y)| FencePoint { x, y })
            .collect();
        if points.len() < 3 {
            return Err(FilterError::TooFewFencePoints {
                found: points.len(),
            });
        }
        let mut fence = Self {
            points,
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        };
        fence.update_extents();
        Ok(fence)
    }

    /// An axis-aligned rectangular fence.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        // Four vertices always satisfy the minimum, so this cannot fail.
        let mut fence = Self {
            points: SmallVec::from_slice(&[
                FencePoint { x: min_x, y: min_y },
                FencePoint { x: max_x, y: min_y },
                FencePoint { x: max_x, y: max_y },
                FencePoint { x: min_x, y: max_y },
            ]),
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        };
        fence.update_extents();
        fence
    }

    /// The fence vertices, in order.
    pub fn points(&self) -> &[FencePoint] {
        &self.points
    }

    /// Cached bounding rectangle as `(min_x, min_y, max_x, max_y)`.
    pub fn extents(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Even-odd containment test.
    pub fn includes_point(&self, x: f64, y: f64) -> bool {
        if x < self.min_x || x > self.max_x || y < self.min_y || y > self.max_y {
            return false;
        }
        let mut inside = false;
        let mut j = self.points.len() - 1;
        for i in 0..self.points.len() {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > y) != (pj.y > y)
                && x < (pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Whether the fence's bounding rectangle overlaps the given one.
    pub fn intersects_extents(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        self.min_x <= max_x && min_x <= self.max_x && self.min_y <= max_y && min_y <= self.max_y
    }

    /// Rewrite every vertex through a fallible coordinate mapping.
    ///
    /// All vertices are converted before any are committed, so a failure
    /// part way through leaves the fence unchanged.
    pub fn try_transform<E>(
        &mut self,
        mut f: impl FnMut(f64, f64) -> Result<(f64, f64), E>,
    ) -> Result<(), E> {
        let mut mapped: SmallVec<[FencePoint; 8]> = SmallVec::with_capacity(self.points.len());
        for p in &self.points {
            let (x, y) = f(p.x, p.y)?;
            mapped.push(FencePoint { x, y });
        }
        self.points = mapped;
        self.update_extents();
        Ok(())
    }

    fn update_extents(&mut self) {
        self.min_x = f64::MAX;
        self.min_y = f64::MAX;
        self.max_x = f64::MIN;
        self.max_y = f64::MIN;
        for p in &self.points {
            self.min_x = self.min_x.min(p.x);
            self.min_y = self.min_y.min(p.y);
            self.max_x = self.max_x.max(p.x);
            self.max_y = self.max_y.max(p.y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Fence {
        Fence::rectangle(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn too_few_points_rejected() {
        assert!(matches!(
            Fence::new([(0.0, 0.0), (1.0, 1.0)]),
            Err(FilterError::TooFewFencePoints { found: 2 })
        ));
    }

    #[test]
    fn interior_and_exterior_points() {
        let fence = unit_square();
        assert!(fence.includes_point(5.0, 5.0));
        assert!(fence.includes_point(0.5, 9.5));
        assert!(!fence.includes_point(-1.0, 5.0));
        assert!(!fence.includes_point(5.0, 10.5));
    }

    #[test]
    fn bounding_extents_cached() {
        let fence = Fence::new([(2.0, 1.0), (8.0, 3.0), (5.0, 9.0)]).unwrap();
        assert_eq!(fence.extents(), (2.0, 1.0, 8.0, 9.0));
    }

    #[test]
    fn concave_fence_uses_even_odd_rule() {
        // A "U" shape: the notch between the arms is outside.
        let fence = Fence::new([
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (7.0, 10.0),
            (7.0, 3.0),
            (3.0, 3.0),
            (3.0, 10.0),
            (0.0, 10.0),
        ])
        .unwrap();
        assert!(fence.includes_point(1.5, 8.0));
        assert!(fence.includes_point(8.5, 8.0));
        assert!(fence.includes_point(5.0, 1.5));
        assert!(!fence.includes_point(5.0, 8.0));
    }

    #[test]
    fn transform_recomputes_extents() {
        let mut fence = unit_square();
        fence
            .try_transform(|x, y| Ok::<_, ()>((x + 100.0, y + 200.0)))
            .unwrap();
        assert_eq!(fence.extents(), (100.0, 200.0, 110.0, 210.0));
        assert!(fence.includes_point(105.0, 205.0));
        assert!(!fence.includes_point(5.0, 5.0));
    }

    #[test]
    fn failed_transform_leaves_fence_unchanged() {
        let mut fence = unit_square();
        let before = fence.clone();
        let result = fence.try_transform(|x, _| {
            if x > 5.0 {
                Err("bad point")
            } else {
                Ok((x * 2.0, 0.0))
            }
        });
        assert!(result.is_err());
        assert_eq!(fence, before);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn points_outside_extents_are_never_included(
                x in -100.0f64..100.0,
                y in -100.0f64..100.0,
            ) {
                let fence = Fence::new([(2.0, 1.0), (8.0, 3.0), (5.0, 9.0)]).unwrap();
                let (min_x, min_y, max_x, max_y) = fence.extents();
                if x < min_x || x > max_x || y < min_y || y > max_y {
                    prop_assert!(!fence.includes_point(x, y));
                }
            }

            #[test]
            fn rectangle_containment_matches_bounds(
                x in -5.0f64..15.0,
                y in -5.0f64..15.0,
            ) {
                let fence = Fence::rectangle(0.0, 0.0, 10.0, 10.0);
                // Edges may go either way under even-odd; stay off them.
                prop_assume!(x != 0.0 && x != 10.0 && y != 0.0 && y != 10.0);
                let expect = x > 0.0 && x < 10.0 && y > 0.0 && y < 10.0;
                prop_assert_eq!(fence.includes_point(x, y), expect);
            }
        }
    }
}
