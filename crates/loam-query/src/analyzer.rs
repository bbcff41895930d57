//! Per-cell analysis of a profile line.
//!
//! Takes the cell sequence emitted by the profile builder and, one leaf
//! sub grid at a time, filters each cell's pass history, groups it into
//! layers and summarizes the stack. Composite elevation merges the
//! machine-recorded elevation with surveyed-surface heights, the newer
//! of the two winning.

use loam_core::{DesignId, DesignLookup, Timestamp};
use loam_filter::{CombinedFilter, ElevationRangeSource};
use loam_model::SiteModel;
use tracing::warn;

use crate::abort::AbortToken;
use crate::error::QueryError;
use crate::layers::{build_layers, summarize_layers, LayerStackSummary, LiftDetector};
use crate::mask::{DesignElevationResolver, ElevationPatch};
use crate::profile::ProfileCell;

/// The analysis result for one profile cell.
#[derive(Clone, Debug)]
pub struct AnalyzedCell {
    /// The profile cell being analyzed.
    pub cell: ProfileCell,
    /// Number of passes surviving the attribute filter.
    pub filtered_pass_count: usize,
    /// Layer stack summary over the filtered passes.
    pub summary: LayerStackSummary,
    /// Time of the newest filtered pass.
    pub last_pass_time: Option<Timestamp>,
    /// Machine elevation merged with surveyed-surface heights; a
    /// surveyed surface recorded after the newest pass supersedes it.
    pub composite_elevation: Option<f32>,
    /// The filter design's elevation at this cell, when one is active.
    pub design_elevation: Option<f32>,
}

impl AnalyzedCell {
    fn vacant(cell: ProfileCell) -> Self {
        Self {
            cell,
            filtered_pass_count: 0,
            summary: LayerStackSummary::default(),
            last_pass_time: None,
            composite_elevation: None,
            design_elevation: None,
        }
    }
}

/// Analyzes the cells of a profile line against one site model.
pub struct CellProfileAnalyzer<'a> {
    model: &'a SiteModel,
    filter: &'a CombinedFilter,
    designs: &'a dyn DesignElevationResolver,
    detector: &'a dyn LiftDetector,
}

impl<'a> CellProfileAnalyzer<'a> {
    /// An analyzer over the given model and restrictions.
    pub fn new(
        model: &'a SiteModel,
        filter: &'a CombinedFilter,
        designs: &'a dyn DesignElevationResolver,
        detector: &'a dyn LiftDetector,
    ) -> Self {
        Self {
            model,
            filter,
            designs,
            detector,
        }
    }

    // The design behind an active design-relative elevation range.
    fn elevation_range_design(&self) -> Option<(DesignId, f64)> {
        match self.filter.attribute.elevation_range() {
            Some((ElevationRangeSource::Design(design), offset, _)) => Some((design, offset)),
            _ => None,
        }
    }

    /// Analyze the cells of a profile line.
    ///
    /// Cells arrive ordered along the path, so consecutive cells in the
    /// same leaf sub grid form one batch: the leaf is fetched once and
    /// design patches are resolved once per batch. A design lookup
    /// failure (beyond the benign empty-patch case) is logged and clears
    /// that sub grid's cells rather than aborting the request.
    pub fn analyze(
        &self,
        cells: &[ProfileCell],
        abort: &AbortToken,
    ) -> Result<Vec<AnalyzedCell>, QueryError> {
        let targets = self.model.targets()?;
        let surveyed = self.model.surveyed_surfaces()?;
        let cell_size = self.model.cell_size();

        let mut out = Vec::with_capacity(cells.len());
        let mut index = 0;
        while index < cells.len() {
            abort.check()?;
            let origin = cells[index].address.leaf_origin();
            let mut end = index + 1;
            while end < cells.len() && cells[end].address.leaf_origin() == origin {
                end += 1;
            }
            let batch = &cells[index..end];
            index = end;

            let leaf = self.model.grid().locate_leaf(origin.x, origin.y);

            let filter_patch = match self.elevation_range_design() {
                None => None,
                Some((design, offset)) => {
                    match self.designs.elevation_patch(design, offset, origin, cell_size) {
                        DesignLookup::Value(patch) => Some(patch),
                        DesignLookup::NoElevationsInRequestedPatch => None,
                        DesignLookup::Failed { reason } => {
                            warn!(
                                origin_x = origin.x,
                                origin_y = origin.y,
                                reason,
                                "design elevation lookup failed, clearing sub grid cells"
                            );
                            out.extend(batch.iter().copied().map(AnalyzedCell::vacant));
                            continue;
                        }
                    }
                }
            };

            // Surveyed-surface heights over this sub grid, newest first.
            let mut surface_patches: Vec<(Timestamp, ElevationPatch)> = Vec::new();
            for record in surveyed.iter() {
                match self
                    .designs
                    .elevation_patch(record.design, record.offset, origin, cell_size)
                {
                    DesignLookup::Value(patch) => surface_patches.push((record.as_of, patch)),
                    DesignLookup::NoElevationsInRequestedPatch => {}
                    DesignLookup::Failed { reason } => {
                        warn!(
                            surface = record.id.0,
                            reason, "surveyed surface lookup failed, surface skipped"
                        );
                    }
                }
            }
            surface_patches.sort_by(|a, b| b.0.cmp(&a.0));

            for cell in batch {
                let (local_x, local_y) = cell.address.local();
                let passes = leaf.map_or(&[][..], |l| l.passes(local_x, local_y));
                let design_elevation =
                    filter_patch.as_ref().and_then(|p| p.get(local_x, local_y));
                let filtered = self.filter.attribute.filter_passes(passes, design_elevation);
                if filtered.is_empty() {
                    out.push(AnalyzedCell {
                        design_elevation,
                        ..AnalyzedCell::vacant(*cell)
                    });
                    continue;
                }

                let layers = build_layers(&filtered, self.detector, &self.filter.attribute);
                let summary = summarize_layers(&layers, &targets);
                let last_pass_time = filtered.last().map(|p| p.time);

                // Newest surveyed surface covering this cell that is at
                // least as recent as the newest pass.
                let surveyed_elevation = surface_patches.iter().find_map(|(as_of, patch)| {
                    let newer = last_pass_time.map_or(true, |t| *as_of >= t);
                    if newer {
                        patch.get(local_x, local_y)
                    } else {
                        None
                    }
                });
                let composite_elevation = surveyed_elevation.or(summary.elevation);

                out.push(AnalyzedCell {
                    cell: *cell,
                    filtered_pass_count: filtered.len(),
                    summary,
                    last_pass_time,
                    composite_elevation,
                    design_elevation,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use loam_core::{CellPass, MachineId, ProjectId, SurveyedSurfaceId};
    use loam_filter::SpatialFilter;
    use loam_grid::{CellAddress, ExistenceMap, DIMENSION};
    use loam_model::codec::encode_surveyed_surfaces;
    use loam_model::{
        stream_names, PersistentStore, SiteModel, StreamKind, SurveyedSurfaceList,
        SurveyedSurfaceRecord,
    };
    use loam_test_utils::MemoryStore;

    use crate::layers::ElevationDeclineDetector;
    use crate::profile::{AllSubGrids, CellProfileBuilder, PathVertex};

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

    // Every cell of every patch sits at one fixed elevation.
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
            DesignLookup::Failed {
                reason: "unused".to_owned(),
            }
        }
    }

    fn detector() -> ElevationDeclineDetector {
        ElevationDeclineDetector { dead_band: 0.2 }
    }

    fn pass(secs: i64, height: f32) -> CellPass {
        CellPass::at(Timestamp::from_seconds(secs), height, MachineId(1))
    }

    fn model_with_passes(address: CellAddress, passes: &[CellPass]) -> SiteModel {
        let mut model = SiteModel::transient(ProjectId(1), 6, 1.0);
        let leaf = model.grid_mut().construct_leaf(address.x, address.y);
        let (lx, ly) = address.local();
        for p in passes {
            leaf.add_pass(lx, ly, *p);
        }
        model
    }

    fn profile_cell(address: CellAddress) -> ProfileCell {
        ProfileCell {
            address,
            station: 0.0,
            intercept_length: 1.0,
            midpoint_x: 0.0,
            midpoint_y: 0.0,
        }
    }

    #[test]
    fn unfiltered_history_summarizes_newest_pass() {
        let address = CellAddress::new(1000, 2000);
        let model = model_with_passes(
            address,
            &[pass(10, 3.0), pass(20, 3.4), pass(30, 3.5)],
        );
        let filter = CombinedFilter::unrestricted();
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &NoDesigns, &detector);
        let out = analyzer
            .analyze(&[profile_cell(address)], &AbortToken::new())
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].filtered_pass_count, 3);
        assert_eq!(out[0].last_pass_time, Some(Timestamp::from_seconds(30)));
        assert_eq!(out[0].composite_elevation, Some(3.5));
        assert_eq!(out[0].summary.layer_count, 1);
    }

    #[test]
    fn time_filter_restricts_analyzed_passes() {
        let address = CellAddress::new(1000, 2000);
        let model = model_with_passes(
            address,
            &[pass(10, 3.0), pass(20, 3.4), pass(30, 3.5)],
        );
        let mut filter = CombinedFilter::unrestricted();
        filter
            .attribute
            .set_time_range(Timestamp::from_seconds(0), Timestamp::from_seconds(25));
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &NoDesigns, &detector);
        let out = analyzer
            .analyze(&[profile_cell(address)], &AbortToken::new())
            .unwrap();

        assert_eq!(out[0].filtered_pass_count, 2);
        assert_eq!(out[0].composite_elevation, Some(3.4));
    }

    #[test]
    fn cell_without_data_yields_vacant_result() {
        let address = CellAddress::new(1000, 2000);
        let model = model_with_passes(address, &[pass(10, 3.0)]);
        let filter = CombinedFilter::unrestricted();
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &NoDesigns, &detector);
        let out = analyzer
            .analyze(
                &[profile_cell(CellAddress::new(5000, 5000))],
                &AbortToken::new(),
            )
            .unwrap();

        assert_eq!(out[0].filtered_pass_count, 0);
        assert_eq!(out[0].composite_elevation, None);
    }

    #[test]
    fn design_elevation_range_filters_by_patch() {
        let address = CellAddress::new(1000, 2000);
        let model = model_with_passes(
            address,
            &[pass(10, 9.8), pass(20, 10.1), pass(30, 12.0)],
        );
        let mut filter = CombinedFilter::unrestricted();
        // Band of [design + 0, design + 0.5] around a flat 10.0 design.
        filter.attribute.set_elevation_range(
            ElevationRangeSource::Design(DesignId(7)),
            0.0,
            0.5,
        );
        let design = FlatDesign(10.0);
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &design, &detector);
        let out = analyzer
            .analyze(&[profile_cell(address)], &AbortToken::new())
            .unwrap();

        assert_eq!(out[0].design_elevation, Some(10.0));
        assert_eq!(out[0].filtered_pass_count, 1);
        assert_eq!(out[0].composite_elevation, Some(10.1));
    }

    #[test]
    fn newer_surveyed_surface_wins_composite_elevation() {
        let address = CellAddress::new(1000, 2000);
        let store = Arc::new(MemoryStore::new());
        let mut model = SiteModel::create(
            store.clone(),
            ProjectId(9),
            6,
            1.0,
            Timestamp::from_seconds(1),
        )
        .unwrap();
        {
            let leaf = model.grid_mut().construct_leaf(address.x, address.y);
            let (lx, ly) = address.local();
            leaf.add_pass(lx, ly, pass(100, 4.0));
        }

        let mut surfaces = SurveyedSurfaceList::new();
        surfaces.add(SurveyedSurfaceRecord {
            id: SurveyedSurfaceId(1),
            name: "post-survey".to_owned(),
            design: DesignId(3),
            as_of: Timestamp::from_seconds(200),
            offset: 2.5,
        });
        let mut bytes = Vec::new();
        encode_surveyed_surfaces(&mut bytes, &surfaces).unwrap();
        store
            .write_stream(
                ProjectId(9),
                stream_names::SURVEYED_SURFACES,
                StreamKind::SurveyedSurfaces,
                &bytes,
            )
            .unwrap();

        let filter = CombinedFilter::unrestricted();
        let design = FlatDesign(10.0);
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &design, &detector);
        let out = analyzer
            .analyze(&[profile_cell(address)], &AbortToken::new())
            .unwrap();

        // Survey at t=200 postdates the newest pass at t=100, so its
        // 10.0 + 2.5 height replaces the machine-recorded 4.0.
        assert_eq!(out[0].composite_elevation, Some(12.5));
        assert_eq!(out[0].summary.elevation, Some(4.0));
    }

    #[test]
    fn older_surveyed_surface_does_not_override() {
        let address = CellAddress::new(1000, 2000);
        let store = Arc::new(MemoryStore::new());
        let mut model = SiteModel::create(
            store.clone(),
            ProjectId(9),
            6,
            1.0,
            Timestamp::from_seconds(1),
        )
        .unwrap();
        {
            let leaf = model.grid_mut().construct_leaf(address.x, address.y);
            let (lx, ly) = address.local();
            leaf.add_pass(lx, ly, pass(300, 4.0));
        }

        let mut surfaces = SurveyedSurfaceList::new();
        surfaces.add(SurveyedSurfaceRecord {
            id: SurveyedSurfaceId(1),
            name: "pre-survey".to_owned(),
            design: DesignId(3),
            as_of: Timestamp::from_seconds(200),
            offset: 2.5,
        });
        let mut bytes = Vec::new();
        encode_surveyed_surfaces(&mut bytes, &surfaces).unwrap();
        store
            .write_stream(
                ProjectId(9),
                stream_names::SURVEYED_SURFACES,
                StreamKind::SurveyedSurfaces,
                &bytes,
            )
            .unwrap();

        let filter = CombinedFilter::unrestricted();
        let design = FlatDesign(10.0);
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &design, &detector);
        let out = analyzer
            .analyze(&[profile_cell(address)], &AbortToken::new())
            .unwrap();

        assert_eq!(out[0].composite_elevation, Some(4.0));
    }

    #[test]
    fn builder_and_analyzer_compose_over_a_line() {
        let mut model = SiteModel::transient(ProjectId(1), 6, 1.0);
        for x in 100..110u32 {
            let leaf = model.grid_mut().construct_leaf(x, 50);
            let addr = CellAddress::new(x, 50);
            let (lx, ly) = addr.local();
            leaf.add_pass(lx, ly, pass(10, x as f32));
        }
        let spatial = SpatialFilter::all();
        let builder =
            CellProfileBuilder::new(model.grid(), &spatial, &NoDesigns, &AllSubGrids);
        let (x0, y0) = model.grid().cell_center_position(100, 50);
        let (x1, y1) = model.grid().cell_center_position(109, 50);
        let path = [
            PathVertex {
                x: x0,
                y: y0,
                station: 0.0,
            },
            PathVertex {
                x: x1,
                y: y1,
                station: 9.0,
            },
        ];
        let cells = builder.build(&path, &AbortToken::new()).unwrap();

        let filter = CombinedFilter::unrestricted();
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &NoDesigns, &detector);
        let out = analyzer.analyze(&cells, &AbortToken::new()).unwrap();

        assert_eq!(out.len(), 10);
        for analyzed in &out {
            assert_eq!(analyzed.filtered_pass_count, 1);
            assert_eq!(
                analyzed.composite_elevation,
                Some(analyzed.cell.address.x as f32)
            );
        }
    }

    #[test]
    fn cancelled_token_aborts_analysis() {
        let address = CellAddress::new(1000, 2000);
        let model = model_with_passes(address, &[pass(10, 3.0)]);
        let filter = CombinedFilter::unrestricted();
        let detector = detector();
        let analyzer = CellProfileAnalyzer::new(&model, &filter, &NoDesigns, &detector);
        let token = AbortToken::new();
        token.cancel();
        assert!(matches!(
            analyzer.analyze(&[profile_cell(address)], &token),
            Err(QueryError::Cancelled)
        ));
    }
}
