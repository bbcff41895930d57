//! Profile line construction: from a station-tagged polyline to the
//! sequence of cells it crosses.
//!
//! Each path segment is cut at every horizontal and vertical cell
//! boundary line it crosses; the resulting intercepts are sorted by
//! station and each one's midpoint is mapped to its on-the-ground cell.
//! A safety cap bounds the intercept count so pathological geometry
//! cannot run away.

use indexmap::IndexMap;
use loam_grid::{CellAddress, CellPassLeaf, SubGridBitMask, SubGridTree};
use loam_filter::SpatialFilter;
use smallvec::SmallVec;
use tracing::warn;

use crate::abort::AbortToken;
use crate::error::QueryError;
use crate::mask::{build_inclusion_mask, DesignElevationResolver};

/// Safety cap on the number of grid intercepts one profile path may
/// produce.
pub const MAX_INTERCEPTS: usize = 10_000;

/// One vertex of a profile path, tagged with its station (distance
/// along the path in world units).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathVertex {
    /// World X.
    pub x: f64,
    /// World Y.
    pub y: f64,
    /// Station at this vertex.
    pub station: f64,
}

/// One cell crossed by the profile path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileCell {
    /// The crossed cell.
    pub address: CellAddress,
    /// Station at the start of the intercept.
    pub station: f64,
    /// Length of the path segment inside the cell.
    pub intercept_length: f64,
    /// World X of the intercept midpoint.
    pub midpoint_x: f64,
    /// World Y of the intercept midpoint.
    pub midpoint_y: f64,
}

/// Which leaf sub grids this worker is responsible for. Distributed
/// deployments supply a partition map; single-process deployments own
/// everything.
pub trait SubGridOwnership {
    /// Whether this worker owns the leaf sub grid at `leaf_origin`.
    fn owns(&self, leaf_origin: CellAddress) -> bool;
}

/// The single-process ownership map: owns every sub grid.
pub struct AllSubGrids;

impl SubGridOwnership for AllSubGrids {
    fn owns(&self, _: CellAddress) -> bool {
        true
    }
}

/// Builds the cell sequence crossed by a profile path.
pub struct CellProfileBuilder<'a> {
    grid: &'a SubGridTree<CellPassLeaf>,
    spatial: &'a SpatialFilter,
    designs: &'a dyn DesignElevationResolver,
    ownership: &'a dyn SubGridOwnership,
}

impl<'a> CellProfileBuilder<'a> {
    /// A builder over the given grid and spatial restrictions.
    pub fn new(
        grid: &'a SubGridTree<CellPassLeaf>,
        spatial: &'a SpatialFilter,
        designs: &'a dyn DesignElevationResolver,
        ownership: &'a dyn SubGridOwnership,
    ) -> Self {
        Self {
            grid,
            spatial,
            designs,
            ownership,
        }
    }

    /// Build the profile cell sequence for `vertices`.
    ///
    /// Degenerate zero-length segments are skipped. Cells whose
    /// midpoint fails the inclusion mask, or whose sub grid this worker
    /// does not own, are dropped. A design lookup failure for one sub
    /// grid is logged and that sub grid contributes no cells.
    pub fn build(
        &self,
        vertices: &[PathVertex],
        abort: &AbortToken,
    ) -> Result<Vec<ProfileCell>, QueryError> {
        let mut cells = Vec::new();
        // Inclusion masks are fetched once per distinct sub grid; a
        // failed design lookup is recorded as an empty mask.
        let mut masks: IndexMap<(u32, u32), SubGridBitMask> = IndexMap::new();
        let mut intercepts = 0usize;

        for pair in vertices.windows(2) {
            abort.check()?;
            let (v0, v1) = (pair[0], pair[1]);
            if v0.x == v1.x && v0.y == v1.y {
                continue;
            }
            let cuts = self.segment_cuts(v0, v1);
            intercepts += cuts.len();
            if intercepts > MAX_INTERCEPTS {
                return Err(QueryError::TooManyIntercepts {
                    found: intercepts,
                    cap: MAX_INTERCEPTS,
                });
            }
            self.emit_segment(v0, v1, &cuts, &mut masks, &mut cells);
        }
        Ok(cells)
    }

    // Parametric positions cutting the segment at every cell boundary
    // line, endpoints included, sorted and deduplicated.
    fn segment_cuts(&self, v0: PathVertex, v1: PathVertex) -> SmallVec<[f64; 16]> {
        let cell = self.grid.cell_size();
        let mut cuts: SmallVec<[f64; 16]> = SmallVec::new();
        cuts.push(0.0);
        cuts.push(1.0);

        let mut axis_cuts = |a0: f64, a1: f64| {
            let (lo, hi) = if a0 < a1 { (a0, a1) } else { (a1, a0) };
            let mut line = (lo / cell).ceil() * cell;
            while line < hi {
                if line > lo {
                    cuts.push((line - a0) / (a1 - a0));
                }
                line += cell;
            }
        };
        if v0.x != v1.x {
            axis_cuts(v0.x, v1.x);
        }
        if v0.y != v1.y {
            axis_cuts(v0.y, v1.y);
        }

        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        cuts
    }

    fn emit_segment(
        &self,
        v0: PathVertex,
        v1: PathVertex,
        cuts: &[f64],
        masks: &mut IndexMap<(u32, u32), SubGridBitMask>,
        cells: &mut Vec<ProfileCell>,
    ) {
        let dx = v1.x - v0.x;
        let dy = v1.y - v0.y;
        let seg_len = (dx * dx + dy * dy).sqrt();

        for pair in cuts.windows(2) {
            let (t0, t1) = (pair[0], pair[1]);
            if t1 - t0 < 1e-12 {
                continue;
            }
            let t_mid = (t0 + t1) / 2.0;
            let mx = v0.x + t_mid * dx;
            let my = v0.y + t_mid * dy;
            let Some(address) = self.grid.world_to_cell(mx, my) else {
                continue;
            };
            let origin = address.leaf_origin();
            if !self.ownership.owns(origin) {
                continue;
            }
            let mask = masks.entry((origin.x, origin.y)).or_insert_with(|| {
                match build_inclusion_mask(self.grid, origin, self.spatial, self.designs) {
                    Ok(inclusion) => inclusion.mask,
                    Err(err) => {
                        warn!(
                            origin_x = origin.x,
                            origin_y = origin.y,
                            error = %err,
                            "design lookup failed building profile mask, \
                             sub grid contributes no cells"
                        );
                        SubGridBitMask::new()
                    }
                }
            });
            let (local_x, local_y) = address.local();
            if !mask.bit_is_set(local_x, local_y) {
                continue;
            }
            cells.push(ProfileCell {
                address,
                station: v0.station + t0 * (v1.station - v0.station),
                intercept_length: seg_len * (t1 - t0),
                midpoint_x: mx,
                midpoint_y: my,
            });
        }
    }
}
