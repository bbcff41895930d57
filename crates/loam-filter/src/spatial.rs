//! Spatial selection filters and their one-time preparation step.
//!
//! A spatial filter is a pure value object describing which ground the
//! request cares about. Input coordinates may arrive as WGS84 lat/lon
//! degrees; [`SpatialFilter::prepare_for_use`] converts them to grid
//! coordinates exactly once and resolves any alignment boundary fence,
//! after which the filter is treated as immutable for the rest of the
//! request.

use loam_core::{AlignmentId, DesignId, DesignLookup};

use crate::error::FilterError;
use crate::fence::Fence;

/// Converts WGS84 positions (radians) into project grid coordinates.
pub trait CoordinateConversion {
    /// Convert a lat/lon pair in radians to grid `(x, y)`.
    fn wgs84_to_grid(&self, lat: f64, lon: f64) -> Result<(f64, f64), ConversionError>;
}

/// A coordinate conversion failure, as reported by the converter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionError {
    /// What went wrong.
    pub reason: String,
}

/// Resolves an alignment station/offset range to a boundary fence.
pub trait DesignBoundaryResolver {
    /// Compute the boundary polygon covering the given station and
    /// offset range along the alignment.
    fn boundary(
        &self,
        alignment: AlignmentId,
        start_station: f64,
        end_station: f64,
        left_offset: f64,
        right_offset: f64,
    ) -> DesignLookup<Fence>;
}

/// The ground selection a spatial filter describes.
#[derive(Clone, Debug, PartialEq)]
pub enum SpatialSelection {
    /// No spatial restriction.
    All,
    /// Cells whose centers fall inside a polygon fence.
    Fence(Fence),
    /// Cells whose centers fall within a radius of a point. With
    /// `is_square` set the region is the axis-aligned square of
    /// half-width `radius` instead of a circle.
    Positional {
        /// Region center X, world units.
        center_x: f64,
        /// Region center Y, world units.
        center_y: f64,
        /// Circle radius or square half-width, world units.
        radius: f64,
        /// Square region rather than circular.
        is_square: bool,
    },
    /// Cells covered by a surface design. Membership is decided by the
    /// design's elevation patches during traversal, not point-in-polygon
    /// here, so this selection places no per-cell restriction itself.
    DesignMask {
        /// The masking design.
        design: DesignId,
    },
    /// Cells inside a station/offset window along an alignment. The
    /// boundary fence is resolved during preparation and cached.
    AlignmentMask {
        /// The alignment the window follows.
        alignment: AlignmentId,
        /// Window start station, metres along the alignment.
        start_station: f64,
        /// Window end station.
        end_station: f64,
        /// Offset left of the centreline, metres.
        left_offset: f64,
        /// Offset right of the centreline, metres.
        right_offset: f64,
        /// Boundary fence resolved from the station/offset window.
        /// `None` until preparation has run.
        boundary: Option<Fence>,
    },
}

/// A spatial restriction over the request's ground area.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialFilter {
    /// Whether coordinates are already in grid units. Cleared when the
    /// filter arrives with WGS84 lat/lon degrees; set by preparation.
    pub coords_are_grid: bool,
    /// The ground selection.
    pub selection: SpatialSelection,
}

impl SpatialFilter {
    /// A filter with no spatial restriction.
    pub fn all() -> Self {
        Self {
            coords_are_grid: true,
            selection: SpatialSelection::All,
        }
    }

    /// A polygon fence filter in grid coordinates.
    pub fn with_fence(fence: Fence) -> Self {
        Self {
            coords_are_grid: true,
            selection: SpatialSelection::Fence(fence),
        }
    }

    /// A positional circle or square filter in grid coordinates.
    pub fn positional(center_x: f64, center_y: f64, radius: f64, is_square: bool) -> Self {
        Self {
            coords_are_grid: true,
            selection: SpatialSelection::Positional {
                center_x,
                center_y,
                radius,
                is_square,
            },
        }
    }

    /// A surface design mask filter.
    pub fn design_mask(design: DesignId) -> Self {
        Self {
            coords_are_grid: true,
            selection: SpatialSelection::DesignMask { design },
        }
    }

    /// An alignment station/offset mask filter with an unresolved
    /// boundary.
    pub fn alignment_mask(
        alignment: AlignmentId,
        start_station: f64,
        end_station: f64,
        left_offset: f64,
        right_offset: f64,
    ) -> Self {
        Self {
            coords_are_grid: true,
            selection: SpatialSelection::AlignmentMask {
                alignment,
                start_station,
                end_station,
                left_offset,
                right_offset,
                boundary: None,
            },
        }
    }

    /// Whether the filter restricts ground at all.
    pub fn has_spatial_restriction(&self) -> bool {
        !matches!(self.selection, SpatialSelection::All)
    }

    /// The design id when this filter is a surface design mask.
    pub fn mask_design(&self) -> Option<DesignId> {
        match self.selection {
            SpatialSelection::DesignMask { design } => Some(design),
            _ => None,
        }
    }

    /// The resolved alignment boundary fence, if any.
    pub fn alignment_boundary(&self) -> Option<&Fence> {
        match &self.selection {
            SpatialSelection::AlignmentMask { boundary, .. } => boundary.as_ref(),
            _ => None,
        }
    }

    /// Whether a cell with the given world-space center is selected.
    ///
    /// Requires grid coordinates; run [`Self::prepare_for_use`] first for
    /// filters that arrived in WGS84.
    pub fn is_cell_in_selection(&self, cx: f64, cy: f64) -> bool {
        match &self.selection {
            SpatialSelection::All => true,
            SpatialSelection::Fence(fence) => fence.includes_point(cx, cy),
            SpatialSelection::Positional {
                center_x,
                center_y,
                radius,
                is_square,
            } => {
                let dx = cx - center_x;
                let dy = cy - center_y;
                if *is_square {
                    dx.abs() <= *radius && dy.abs() <= *radius
                } else {
                    dx * dx + dy * dy <= radius * radius
                }
            }
            // Design mask membership comes from elevation patch lookups
            // during traversal, not from a per-cell point test here.
            SpatialSelection::DesignMask { .. } => true,
            SpatialSelection::AlignmentMask { boundary, .. } => match boundary {
                Some(fence) => fence.includes_point(cx, cy),
                None => true,
            },
        }
    }

    /// One-time coordinate conversion and boundary resolution.
    ///
    /// Converts fence vertices and positional centers from lat/lon
    /// degrees to grid units via the project's coordinate system, then
    /// resolves the alignment boundary fence if one is configured and
    /// not yet cached. Idempotent: a second call on an already-prepared
    /// filter changes nothing.
    pub fn prepare_for_use(
        &mut self,
        converter: &dyn CoordinateConversion,
        boundaries: &dyn DesignBoundaryResolver,
    ) -> Result<(), FilterError> {
        if !self.coords_are_grid {
            let convert = |x: f64, y: f64| {
                // Stored as lat/lon degrees; the converter takes radians.
                converter.wgs84_to_grid(y.to_radians(), x.to_radians())
            };
            match &mut self.selection {
                SpatialSelection::Fence(fence) => {
                    fence.try_transform(convert).map_err(|e| {
                        FilterError::FailedToConvertCoordinates { reason: e.reason }
                    })?;
                }
                SpatialSelection::Positional {
                    center_x, center_y, ..
                } => {
                    let (x, y) = convert(*center_x, *center_y).map_err(|e| {
                        FilterError::FailedToConvertCoordinates { reason: e.reason }
                    })?;
                    *center_x = x;
                    *center_y = y;
                }
                SpatialSelection::All
                | SpatialSelection::DesignMask { .. }
                | SpatialSelection::AlignmentMask { .. } => {}
            }
            self.coords_are_grid = true;
        }

        if let SpatialSelection::AlignmentMask {
            alignment,
            start_station,
            end_station,
            left_offset,
            right_offset,
            boundary,
        } = &mut self.selection
        {
            if boundary.is_none() {
                match boundaries.boundary(
                    *alignment,
                    *start_station,
                    *end_station,
                    *left_offset,
                    *right_offset,
                ) {
                    DesignLookup::Value(fence) => *boundary = Some(fence),
                    DesignLookup::NoElevationsInRequestedPatch => {
                        return Err(FilterError::BoundaryResolutionFailed {
                            reason: "alignment has no elevations over the requested stations"
                                .to_owned(),
                        });
                    }
                    DesignLookup::Failed { reason } => {
                        return Err(FilterError::BoundaryResolutionFailed { reason });
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Planar "conversion" that scales degrees into metres, close enough
    /// to exercise the conversion plumbing.
    struct FlatEarth;

    impl CoordinateConversion for FlatEarth {
        fn wgs84_to_grid(&self, lat: f64, lon: f64) -> Result<(f64, f64), ConversionError> {
            Ok((lon.to_degrees() * 1000.0, lat.to_degrees() * 1000.0))
        }
    }

    struct FailingConversion;

    impl CoordinateConversion for FailingConversion {
        fn wgs84_to_grid(&self, _: f64, _: f64) -> Result<(f64, f64), ConversionError> {
            Err(ConversionError {
                reason: "point outside projection".to_owned(),
            })
        }
    }

    struct FixedBoundary(DesignLookup<Fence>);

    impl DesignBoundaryResolver for FixedBoundary {
        fn boundary(
            &self,
            _: AlignmentId,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
        ) -> DesignLookup<Fence> {
            self.0.clone()
        }
    }

    fn no_boundary() -> FixedBoundary {
        FixedBoundary(DesignLookup::Failed {
            reason: "unused".to_owned(),
        })
    }

    #[test]
    fn fence_selection_includes_center_inside() {
        let filter = SpatialFilter::with_fence(Fence::rectangle(0.0, 0.0, 10.0, 10.0));
        assert!(filter.is_cell_in_selection(5.0, 5.0));
        assert!(!filter.is_cell_in_selection(15.0, 15.0));
    }

    #[test]
    fn circular_selection_uses_euclidean_distance() {
        let filter = SpatialFilter::positional(0.0, 0.0, 10.0, false);
        assert!(filter.is_cell_in_selection(7.0, 7.0));
        assert!(!filter.is_cell_in_selection(8.0, 8.0));
    }

    #[test]
    fn square_selection_uses_half_width() {
        let filter = SpatialFilter::positional(0.0, 0.0, 10.0, true);
        assert!(filter.is_cell_in_selection(8.0, 8.0));
        assert!(!filter.is_cell_in_selection(11.0, 0.0));
    }

    #[test]
    fn all_selection_is_unrestricted() {
        let filter = SpatialFilter::all();
        assert!(!filter.has_spatial_restriction());
        assert!(filter.is_cell_in_selection(1.0e9, -1.0e9));
    }

    #[test]
    fn prepare_converts_fence_vertices_once() {
        let mut filter = SpatialFilter {
            coords_are_grid: false,
            selection: SpatialSelection::Fence(
                Fence::new([(1.0, 1.0), (2.0, 1.0), (2.0, 2.0)]).unwrap(),
            ),
        };
        filter.prepare_for_use(&FlatEarth, &no_boundary()).unwrap();
        assert!(filter.coords_are_grid);
        let after_first = filter.clone();

        // A second prepare must not double convert.
        filter.prepare_for_use(&FlatEarth, &no_boundary()).unwrap();
        assert_eq!(filter, after_first);

        match &filter.selection {
            SpatialSelection::Fence(fence) => {
                assert!((fence.points()[0].x - 1000.0).abs() < 1e-6);
                assert!((fence.points()[0].y - 1000.0).abs() < 1e-6);
            }
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[test]
    fn prepare_converts_positional_center() {
        let mut filter = SpatialFilter {
            coords_are_grid: false,
            selection: SpatialSelection::Positional {
                center_x: 3.0,
                center_y: 4.0,
                radius: 25.0,
                is_square: false,
            },
        };
        filter.prepare_for_use(&FlatEarth, &no_boundary()).unwrap();
        match filter.selection {
            SpatialSelection::Positional {
                center_x, center_y, ..
            } => {
                assert!((center_x - 3000.0).abs() < 1e-6);
                assert!((center_y - 4000.0).abs() < 1e-6);
            }
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[test]
    fn conversion_failure_surfaces_typed_error() {
        let mut filter = SpatialFilter {
            coords_are_grid: false,
            selection: SpatialSelection::Fence(
                Fence::new([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]).unwrap(),
            ),
        };
        match filter.prepare_for_use(&FailingConversion, &no_boundary()) {
            Err(FilterError::FailedToConvertCoordinates { reason }) => {
                assert_eq!(reason, "point outside projection");
            }
            other => panic!("expected conversion failure, got {other:?}"),
        }
        // The failed filter stays unconverted for the caller to discard.
        assert!(!filter.coords_are_grid);
    }

    #[test]
    fn alignment_boundary_resolved_and_cached() {
        let fence = Fence::rectangle(0.0, 0.0, 100.0, 20.0);
        let mut filter = SpatialFilter::alignment_mask(AlignmentId(7), 0.0, 100.0, -10.0, 10.0);
        filter
            .prepare_for_use(&FlatEarth, &FixedBoundary(DesignLookup::Value(fence.clone())))
            .unwrap();
        assert_eq!(filter.alignment_boundary(), Some(&fence));
        assert!(filter.is_cell_in_selection(50.0, 10.0));
        assert!(!filter.is_cell_in_selection(50.0, 30.0));

        // Cached boundary is not re-requested; a failing resolver on the
        // second call is never consulted.
        filter
            .prepare_for_use(&FlatEarth, &no_boundary())
            .unwrap();
        assert_eq!(filter.alignment_boundary(), Some(&fence));
    }

    #[test]
    fn empty_boundary_patch_aborts_not_silently_empty() {
        let mut filter = SpatialFilter::alignment_mask(AlignmentId(7), 0.0, 100.0, -10.0, 10.0);
        let result = filter.prepare_for_use(
            &FlatEarth,
            &FixedBoundary(DesignLookup::NoElevationsInRequestedPatch),
        );
        assert!(matches!(
            result,
            Err(FilterError::BoundaryResolutionFailed { .. })
        ));
    }
}
