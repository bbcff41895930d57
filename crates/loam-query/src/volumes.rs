//! Cut/fill volume computation between two surfaces.
//!
//! A surface is a filtered view of the production data, a design at an
//! offset, or a fixed benchmark level. The calculator unions the
//! relevant existence maps into one working extent, then walks each
//! populated sub grid deriving a base and top elevation per cell and
//! accumulating cut and fill contributions.

use loam_core::{CellPass, DesignId, DesignLookup, Timestamp};
use loam_filter::{CombinedFilter, ElevationRangeSource};
use loam_grid::{
    BoundingExtents3D, CellAddress, CellPassLeaf, ExistenceMap, DIMENSION,
};
use loam_model::SiteModel;
use tracing::warn;

use crate::abort::AbortToken;
use crate::error::QueryError;
use crate::mask::{DesignElevationResolver, ElevationPatch};

/// One logical surface of a volumes request.
#[derive(Clone, Debug)]
pub enum VolumeSurface {
    /// The production surface selected by a filter.
    Filter(CombinedFilter),
    /// A design surface at a vertical offset.
    Design {
        /// The surface design.
        design: DesignId,
        /// Vertical offset applied to the design, world units.
        offset: f64,
    },
    /// A fixed benchmark level.
    Level(f64),
}

/// Accumulated volumes over the working extent.
#[derive(Clone, Debug)]
pub struct VolumesAggregator {
    /// Volume where the top surface sits below the base.
    pub cut_volume: f64,
    /// Volume where the top surface sits above the base.
    pub fill_volume: f64,
    /// Plan area contributing to cut.
    pub cut_area: f64,
    /// Plan area contributing to fill.
    pub fill_area: f64,
    /// Plan area where both surfaces had an elevation.
    pub coverage_area: f64,
    /// Bounding extents of the contributing cells.
    pub extents: BoundingExtents3D,
}

impl VolumesAggregator {
    fn new() -> Self {
        Self {
            cut_volume: 0.0,
            fill_volume: 0.0,
            cut_area: 0.0,
            fill_area: 0.0,
            coverage_area: 0.0,
            extents: BoundingExtents3D::inverted(),
        }
    }

    /// Fill minus cut.
    pub fn net_volume(&self) -> f64 {
        self.fill_volume - self.cut_volume
    }

    fn accumulate(&mut self, base: f64, top: f64, cell_area: f64, wx: f64, wy: f64) {
        self.coverage_area += cell_area;
        let diff = top - base;
        if diff >= 0.0 {
            self.fill_volume += diff * cell_area;
            self.fill_area += cell_area;
        } else {
            self.cut_volume += -diff * cell_area;
            self.cut_area += cell_area;
        }
        self.extents.include_point(wx, wy);
        self.extents.include_elevation(base);
        self.extents.include_elevation(top);
    }
}

// A surface resolved for one sub grid.
enum PreparedSurface<'a> {
    Level(f64),
    Design(Option<ElevationPatch>),
    Filter {
        filter: &'a CombinedFilter,
        design_patch: Option<ElevationPatch>,
    },
}

/// Computes cut/fill volumes between a base and a top surface.
pub struct VolumesCalculator<'a> {
    model: &'a SiteModel,
    base: &'a VolumeSurface,
    top: &'a VolumeSurface,
    designs: &'a dyn DesignElevationResolver,
}

impl<'a> VolumesCalculator<'a> {
    /// A calculator over the given model and surface pair.
    pub fn new(
        model: &'a SiteModel,
        base: &'a VolumeSurface,
        top: &'a VolumeSurface,
        designs: &'a dyn DesignElevationResolver,
    ) -> Self {
        Self {
            model,
            base,
            top,
            designs,
        }
    }

    /// Run the computation, checking the abort token between sub grids.
    pub fn compute(&self, abort: &AbortToken) -> Result<VolumesAggregator, QueryError> {
        let extent = self.working_extent()?;
        let mut origins = Vec::new();
        extent.scan_set_bits_as_addresses(|addr| origins.push(addr));

        let grid = self.model.grid();
        let cell_size = grid.cell_size();
        let cell_area = cell_size * cell_size;
        let mut aggregator = VolumesAggregator::new();

        for origin in origins {
            abort.check()?;
            let leaf = grid.locate_leaf(origin.x, origin.y);

            let (Some(base), Some(top)) = (
                self.prepare_surface(self.base, origin, cell_size)?,
                self.prepare_surface(self.top, origin, cell_size)?,
            ) else {
                continue;
            };

            for local_y in 0..DIMENSION {
                for local_x in 0..DIMENSION {
                    let (wx, wy) =
                        grid.cell_center_position(origin.x + local_x, origin.y + local_y);
                    let base_z = surface_elevation(&base, leaf, local_x, local_y, wx, wy);
                    let top_z = surface_elevation(&top, leaf, local_x, local_y, wx, wy);
                    if let (Some(base_z), Some(top_z)) = (base_z, top_z) {
                        aggregator.accumulate(base_z, top_z, cell_area, wx, wy);
                    }
                }
            }
        }
        Ok(aggregator)
    }

    // Union of the production existence map, the surface designs'
    // coverage, and the coverage of surveyed surfaces falling inside the
    // filters' time ranges.
    fn working_extent(&self) -> Result<ExistenceMap, QueryError> {
        let mut extent = (*self.model.existence_map()?).clone();
        // Staged ingest may not be reflected in the persisted map yet.
        self.model.grid().scan_leaves(|leaf| {
            extent.set_for_data_address(leaf.origin());
            true
        });
        for surface in [self.base, self.top] {
            match surface {
                VolumeSurface::Design { design, .. } => {
                    self.union_design_coverage(&mut extent, *design);
                }
                VolumeSurface::Filter(filter) => {
                    if let Some((start, end)) = filter.attribute.time_range() {
                        let surveyed = self.model.surveyed_surfaces()?;
                        for record in surveyed.iter() {
                            if record.as_of.in_range(start, end) {
                                self.union_design_coverage(&mut extent, record.design);
                            }
                        }
                    }
                }
                VolumeSurface::Level(_) => {}
            }
        }
        Ok(extent)
    }

    fn union_design_coverage(&self, extent: &mut ExistenceMap, design: DesignId) {
        match self.designs.existence_map(design) {
            DesignLookup::Value(coverage) => extent.or_with(&coverage),
            DesignLookup::NoElevationsInRequestedPatch => {}
            DesignLookup::Failed { reason } => {
                warn!(
                    design = design.0,
                    reason, "design coverage lookup failed, coverage not unioned"
                );
            }
        }
    }

    // `Ok(None)` means a lookup failure already logged; the sub grid
    // contributes nothing.
    fn prepare_surface(
        &self,
        surface: &'a VolumeSurface,
        origin: CellAddress,
        cell_size: f64,
    ) -> Result<Option<PreparedSurface<'a>>, QueryError> {
        match surface {
            VolumeSurface::Level(level) => Ok(Some(PreparedSurface::Level(*level))),
            VolumeSurface::Design { design, offset } => {
                match self
                    .designs
                    .elevation_patch(*design, *offset, origin, cell_size)
                {
                    DesignLookup::Value(patch) => Ok(Some(PreparedSurface::Design(Some(patch)))),
                    DesignLookup::NoElevationsInRequestedPatch => {
                        Ok(Some(PreparedSurface::Design(None)))
                    }
                    DesignLookup::Failed { reason } => {
                        warn!(
                            origin_x = origin.x,
                            origin_y = origin.y,
                            reason,
                            "design elevation lookup failed, sub grid skipped"
                        );
                        Ok(None)
                    }
                }
            }
            VolumeSurface::Filter(filter) => {
                let design_patch = match filter.attribute.elevation_range() {
                    Some((ElevationRangeSource::Design(design), offset, _)) => {
                        match self
                            .designs
                            .elevation_patch(design, offset, origin, cell_size)
                        {
                            DesignLookup::Value(patch) => Some(patch),
                            DesignLookup::NoElevationsInRequestedPatch => None,
                            DesignLookup::Failed { reason } => {
                                warn!(
                                    origin_x = origin.x,
                                    origin_y = origin.y,
                                    reason,
                                    "design elevation lookup failed, sub grid skipped"
                                );
                                return Ok(None);
                            }
                        }
                    }
                    _ => None,
                };
                Ok(Some(PreparedSurface::Filter {
                    filter,
                    design_patch,
                }))
            }
        }
    }
}

fn surface_elevation(
    surface: &PreparedSurface<'_>,
    leaf: Option<&CellPassLeaf>,
    local_x: u32,
    local_y: u32,
    wx: f64,
    wy: f64,
) -> Option<f64> {
    match surface {
        PreparedSurface::Level(level) => Some(*level),
        PreparedSurface::Design(patch) => patch
            .as_ref()
            .and_then(|p| p.get(local_x, local_y))
            .map(f64::from),
        PreparedSurface::Filter {
            filter,
            design_patch,
        } => {
            if !filter.spatial.is_cell_in_selection(wx, wy) {
                return None;
            }
            let passes = leaf.map_or(&[][..], |l| l.passes(local_x, local_y));
            let design_elevation = design_patch.as_ref().and_then(|p| p.get(local_x, local_y));
            let filtered = filter.attribute.filter_passes(passes, design_elevation);
            filter
                .attribute
                .select_elevation(&filtered)
                .map(f64::from)
        }
    }
}

/// The progressive (time-sliced) elevation series for one cell.
///
/// One bucket per `interval_us` step from `start` to `end` inclusive.
/// A bucket's elevation is the height of the newest pass at or before
/// the bucket time; a reverse scan seeds the elevation current
/// immediately before the window. Buckets with no intervening pass hold
/// the previous bucket's value (step-hold, no interpolation).
pub fn progressive_series(
    passes: &[CellPass],
    start: Timestamp,
    end: Timestamp,
    interval_us: i64,
) -> Vec<Option<f32>> {
    let mut series = Vec::new();
    if interval_us <= 0 || end < start {
        return series;
    }

    let mut current = passes
        .iter()
        .rev()
        .find(|p| p.time < start && p.has_height())
        .map(|p| p.height);
    let mut in_window = passes
        .iter()
        .filter(|p| p.has_height() && p.time >= start && p.time <= end)
        .peekable();

    let mut bucket = start;
    while bucket <= end {
        while let Some(pass) = in_window.peek() {
            if pass.time <= bucket {
                current = Some(pass.height);
                in_window.next();
            } else {
                break;
            }
        }
        series.push(current);
        bucket = bucket + interval_us;
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::{MachineId, ProjectId};
    use loam_grid::ExistenceMap;

    struct NoDesigns;

    impl DesignElevationResolver for NoDesigns {
        fn elevation_patch(
            &self,
            _: DesignId,
            _: f64,
            _: CellAddress,
            _: f64,
        ) -> DesignLookup<ElevationPatch> {
            DesignLookup::NoElevationsInRequestedPatch
        }

        fn existence_map(&self, _: DesignId) -> DesignLookup<ExistenceMap> {
            DesignLookup::NoElevationsInRequestedPatch
        }
    }

    struct FlatDesign(f32);

    impl DesignElevationResolver for FlatDesign {
        fn elevation_patch(
            &self,
            _: DesignId,
            offset: f64,
            _: CellAddress,
            _: f64,
        ) -> DesignLookup<ElevationPatch> {
            let mut patch = ElevationPatch::empty();
            for y in 0..DIMENSION {
                for x in 0..DIMENSION {
                    patch.set(x, y, self.0 + offset as f32);
                }
            }
            DesignLookup::Value(patch)
        }

        fn existence_map(&self, _: DesignId) -> DesignLookup<ExistenceMap> {
            DesignLookup::NoElevationsInRequestedPatch
        }
    }

    fn pass(secs: i64, height: f32) -> CellPass {
        CellPass::at(Timestamp::from_seconds(secs), height, MachineId(1))
    }

    // Four cells, one pass each at a known height.
    fn model() -> SiteModel {
        let mut model = SiteModel::transient(ProjectId(1), 6, 1.0);
        {
            let leaf = model.grid_mut().construct_leaf(1000, 2000);
            leaf.add_pass(8, 16, pass(10, 2.0));
            leaf.add_pass(9, 16, pass(10, 3.0));
            leaf.add_pass(10, 16, pass(10, 4.0));
            leaf.add_pass(11, 16, pass(10, 5.0));
        }
        model
    }

    #[test]
    fn level_base_filter_top_accumulates_fill() {
        let model = model();
        let base = VolumeSurface::Level(0.0);
        let top = VolumeSurface::Filter(CombinedFilter::unrestricted());
        let calc = VolumesCalculator::new(&model, &base, &top, &NoDesigns);
        let result = calc.compute(&AbortToken::new()).unwrap();

        // Heights 2+3+4+5 over 1-square-unit cells.
        assert!((result.fill_volume - 14.0).abs() < 1e-9);
        assert_eq!(result.cut_volume, 0.0);
        assert!((result.coverage_area - 4.0).abs() < 1e-9);
        assert!(result.extents.is_valid());
    }

    #[test]
    fn design_base_above_ground_accumulates_cut() {
        let model = model();
        let base = VolumeSurface::Design {
            design: DesignId(1),
            offset: 0.0,
        };
        let top = VolumeSurface::Filter(CombinedFilter::unrestricted());
        let calc = VolumesCalculator::new(&model, &base, &top, &FlatDesign(10.0));
        let result = calc.compute(&AbortToken::new()).unwrap();

        // Ground sits 8+7+6+5 below a flat design at 10.0.
        assert!((result.cut_volume - 26.0).abs() < 1e-9);
        assert_eq!(result.fill_volume, 0.0);
        assert!((result.cut_area - 4.0).abs() < 1e-9);
    }

    #[test]
    fn cells_without_passes_contribute_nothing_between_filter_surfaces() {
        let model = model();
        let base = VolumeSurface::Filter(CombinedFilter::unrestricted());
        let top = VolumeSurface::Filter(CombinedFilter::unrestricted());
        let calc = VolumesCalculator::new(&model, &base, &top, &NoDesigns);
        let result = calc.compute(&AbortToken::new()).unwrap();

        // Identical surfaces: zero net movement over the 4 covered cells.
        assert_eq!(result.net_volume(), 0.0);
        assert!((result.coverage_area - 4.0).abs() < 1e-9);
    }

    #[test]
    fn cancelled_token_aborts_compute() {
        let model = model();
        let base = VolumeSurface::Level(0.0);
        let top = VolumeSurface::Filter(CombinedFilter::unrestricted());
        let calc = VolumesCalculator::new(&model, &base, &top, &NoDesigns);
        let token = AbortToken::new();
        token.cancel();
        assert!(matches!(
            calc.compute(&token),
            Err(QueryError::Cancelled)
        ));
    }

    #[test]
    fn progressive_series_holds_previous_elevation() {
        let hour = 3_600_000_000;
        let day = Timestamp::from_hours(24 * 18_263);
        // One prior pass at 3.0, one in-window pass half an hour in.
        let passes = [
            CellPass::at(Timestamp(day.0 - hour), 3.0, MachineId(1)),
            CellPass::at(day + hour / 2, 5.0, MachineId(1)),
        ];
        let series = progressive_series(&passes, day, day + 2 * hour, hour);
        assert_eq!(series, vec![Some(3.0), Some(5.0), Some(5.0)]);
    }

    #[test]
    fn progressive_series_with_no_prior_pass_starts_empty() {
        let start = Timestamp::from_seconds(1000);
        let passes = [pass(1500, 7.0)];
        let series = progressive_series(&passes, start, start + 1_000_000_000, 500_000_000);
        assert_eq!(series, vec![None, Some(7.0), Some(7.0)]);
    }

    #[test]
    fn progressive_series_skips_null_heights() {
        let start = Timestamp::from_seconds(1000);
        let mut null_pass = pass(1200, 0.0);
        null_pass.height = loam_core::NULL_HEIGHT;
        let passes = [pass(900, 2.0), null_pass];
        let series = progressive_series(&passes, start, start + 400_000_000, 200_000_000);
        assert_eq!(series, vec![Some(2.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn degenerate_interval_yields_no_buckets() {
        assert!(progressive_series(&[], Timestamp(10), Timestamp(5), 1).is_empty());
        assert!(progressive_series(&[], Timestamp(0), Timestamp(10), 0).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        // Brute force: the newest non-null height at or before `at`.
        fn height_at(passes: &[CellPass], at: Timestamp) -> Option<f32> {
            passes
                .iter()
                .filter(|p| p.has_height() && p.time <= at)
                .next_back()
                .map(|p| p.height)
        }

        proptest! {
            #[test]
            fn series_matches_brute_force_scan(
                times in proptest::collection::vec(0i64..10_000, 0..20),
                start in 0i64..5_000,
                buckets in 1usize..10,
                interval in 1i64..2_000,
            ) {
                let mut times = times;
                times.sort_unstable();
                let passes: Vec<CellPass> = times
                    .iter()
                    .enumerate()
                    .map(|(i, &t)| {
                        CellPass::at(Timestamp(t), i as f32, MachineId(1))
                    })
                    .collect();

                let start = Timestamp(start);
                let end = start + (buckets as i64 - 1) * interval;
                let series = progressive_series(&passes, start, end, interval);
                prop_assert_eq!(series.len(), buckets);
                for (k, value) in series.iter().enumerate() {
                    let bucket = start + k as i64 * interval;
                    prop_assert_eq!(*value, height_at(&passes, bucket));
                }
            }
        }
    }
}
