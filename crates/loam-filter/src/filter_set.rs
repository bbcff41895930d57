//! Combined filters and ordered filter sets.

use crate::attribute::AttributeFilter;
use crate::error::FilterError;
use crate::spatial::{CoordinateConversion, DesignBoundaryResolver, SpatialFilter};

/// One spatial restriction paired with one attribute restriction.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedFilter {
    /// Which ground the request cares about.
    pub spatial: SpatialFilter,
    /// Which passes within that ground count.
    pub attribute: AttributeFilter,
}

impl CombinedFilter {
    /// A filter with no spatial or attribute restriction.
    pub fn unrestricted() -> Self {
        Self {
            spatial: SpatialFilter::all(),
            attribute: AttributeFilter::new(),
        }
    }

    /// Validate configuration and run the one-time preparation step.
    pub fn prepare_for_use(
        &mut self,
        converter: &dyn CoordinateConversion,
        boundaries: &dyn DesignBoundaryResolver,
    ) -> Result<(), FilterError> {
        self.attribute.validate()?;
        self.spatial.prepare_for_use(converter, boundaries)?;
        self.attribute.mark_prepared();
        Ok(())
    }
}

/// An ordered collection of combined filters.
///
/// Typically holds one filter, or a base/top pair for between-filter
/// volumes, sometimes with a third synthesized intersection filter.
/// Empty slots are permitted and skipped by consumers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSet {
    filters: Vec<Option<CombinedFilter>>,
}

impl FilterSet {
    /// An empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding a single filter.
    pub fn single(filter: CombinedFilter) -> Self {
        Self {
            filters: vec![Some(filter)],
        }
    }

    /// A base/top pair, in that order.
    pub fn base_top(base: CombinedFilter, top: CombinedFilter) -> Self {
        Self {
            filters: vec![Some(base), Some(top)],
        }
    }

    /// Append a slot, occupied or empty.
    pub fn push(&mut self, filter: Option<CombinedFilter>) {
        self.filters.push(filter);
    }

    /// All slots, including empty ones, in order.
    pub fn slots(&self) -> &[Option<CombinedFilter>] {
        &self.filters
    }

    /// The filter at `index`, when the slot exists and is occupied.
    pub fn get(&self, index: usize) -> Option<&CombinedFilter> {
        self.filters.get(index).and_then(|f| f.as_ref())
    }

    /// Occupied filters in order, skipping empty slots.
    pub fn iter_present(&self) -> impl Iterator<Item = &CombinedFilter> {
        self.filters.iter().filter_map(|f| f.as_ref())
    }

    /// Number of occupied slots.
    pub fn present_count(&self) -> usize {
        self.filters.iter().filter(|f| f.is_some()).count()
    }

    /// Prepare every occupied filter. The first failure aborts; empty
    /// slots are skipped.
    pub fn prepare_all(
        &mut self,
        converter: &dyn CoordinateConversion,
        boundaries: &dyn DesignBoundaryResolver,
    ) -> Result<(), FilterError> {
        for filter in self.filters.iter_mut().flatten() {
            filter.prepare_for_use(converter, boundaries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::Fence;
    use crate::spatial::ConversionError;
    use loam_core::{AlignmentId, DesignLookup, MachineId, Timestamp};

    struct Identity;

    impl CoordinateConversion for Identity {
        fn wgs84_to_grid(&self, lat: f64, lon: f64) -> Result<(f64, f64), ConversionError> {
            Ok((lon.to_degrees(), lat.to_degrees()))
        }
    }

    struct NoBoundaries;

    impl DesignBoundaryResolver for NoBoundaries {
        fn boundary(
            &self,
            _: AlignmentId,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
        ) -> DesignLookup<Fence> {
            DesignLookup::Failed {
                reason: "no alignment data".to_owned(),
            }
        }
    }

    #[test]
    fn empty_slots_are_skipped() {
        let mut set = FilterSet::new();
        set.push(None);
        set.push(Some(CombinedFilter::unrestricted()));
        set.push(None);
        assert_eq!(set.slots().len(), 3);
        assert_eq!(set.present_count(), 1);
        assert_eq!(set.iter_present().count(), 1);
        assert!(set.get(0).is_none());
        assert!(set.get(1).is_some());
    }

    #[test]
    fn prepare_all_marks_attribute_filters() {
        let mut base = CombinedFilter::unrestricted();
        base.attribute
            .set_time_range(Timestamp::from_seconds(0), Timestamp::from_seconds(100));
        let mut top = CombinedFilter::unrestricted();
        top.attribute.set_machines(vec![MachineId(2)]);

        let mut set = FilterSet::base_top(base, top);
        set.prepare_all(&Identity, &NoBoundaries).unwrap();
        for filter in set.iter_present() {
            assert!(filter.attribute.is_prepared());
        }
    }

    #[test]
    fn boundary_failure_aborts_prepare_all() {
        let mut set = FilterSet::base_top(
            CombinedFilter::unrestricted(),
            CombinedFilter {
                spatial: crate::spatial::SpatialFilter::alignment_mask(
                    AlignmentId(1),
                    0.0,
                    50.0,
                    -5.0,
                    5.0,
                ),
                attribute: AttributeFilter::new(),
            },
        );
        assert!(matches!(
            set.prepare_all(&Identity, &NoBoundaries),
            Err(crate::error::FilterError::BoundaryResolutionFailed { .. })
        ));
    }
}
