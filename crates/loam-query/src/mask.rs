//! Per-sub-grid cell inclusion masks.
//!
//! Before any pass-level filtering runs, each visited leaf sub grid gets
//! a bitmask of the cells the request's spatial restrictions admit:
//! fence and positional predicates test the cell's world-space center,
//! a pre-resolved alignment boundary clears centers outside it, and a
//! surface design mask intersects with the design's per-cell elevation
//! coverage.

use loam_core::{DesignId, DesignLookup, NULL_HEIGHT};
use loam_grid::{CellAddress, CellPassLeaf, SubGridBitMask, SubGridTree, DIMENSION};
use loam_filter::SpatialFilter;

use crate::error::QueryError;

/// A per-cell elevation grid for one sub grid, as produced by a design
/// elevation lookup. Cells the design does not cover hold the null
/// height sentinel.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationPatch {
    cells: Vec<f32>,
}

impl ElevationPatch {
    /// A patch with every cell uncovered.
    pub fn empty() -> Self {
        Self {
            cells: vec![NULL_HEIGHT; (DIMENSION * DIMENSION) as usize],
        }
    }

    /// Set the elevation of one cell by sub grid local coordinates.
    pub fn set(&mut self, local_x: u32, local_y: u32, elevation: f32) {
        self.cells[(local_y * DIMENSION + local_x) as usize] = elevation;
    }

    /// The elevation of one cell, or `None` where the design has no
    /// coverage.
    pub fn get(&self, local_x: u32, local_y: u32) -> Option<f32> {
        let v = self.cells[(local_y * DIMENSION + local_x) as usize];
        (v != NULL_HEIGHT).then_some(v)
    }
}

/// Resolves per-cell design elevations for one sub grid at a time.
pub trait DesignElevationResolver {
    /// The design's elevations over the leaf sub grid at `origin`.
    fn elevation_patch(
        &self,
        design: DesignId,
        offset: f64,
        origin: CellAddress,
        cell_size: f64,
    ) -> DesignLookup<ElevationPatch>;

    /// The design's coverage existence map, for extent resolution.
    fn existence_map(&self, design: DesignId) -> DesignLookup<loam_grid::ExistenceMap>;
}

/// The inclusion decision for one sub grid.
pub struct InclusionMask {
    /// Cells admitted by the spatial restrictions.
    pub mask: SubGridBitMask,
    /// The design elevation patch fetched while masking, when a design
    /// mask was active. Reused by pass-level filtering so the lookup
    /// runs once per sub grid.
    pub design_patch: Option<ElevationPatch>,
}

impl InclusionMask {
    /// A mask admitting nothing.
    pub fn empty() -> Self {
        Self {
            mask: SubGridBitMask::new(),
            design_patch: None,
        }
    }
}

/// Build the inclusion mask for the leaf sub grid at `leaf_origin`.
///
/// A design mask lookup answering "no elevations in patch" is benign
/// and yields an empty mask; any other lookup failure is returned as an
/// error for the caller to log and treat as an empty sub grid.
pub fn build_inclusion_mask(
    grid: &SubGridTree<CellPassLeaf>,
    leaf_origin: CellAddress,
    spatial: &SpatialFilter,
    designs: &dyn DesignElevationResolver,
) -> Result<InclusionMask, QueryError> {
    let mut mask = SubGridBitMask::new();
    for local_y in 0..DIMENSION {
        for local_x in 0..DIMENSION {
            let (cx, cy) =
                grid.cell_center_position(leaf_origin.x + local_x, leaf_origin.y + local_y);
            if spatial.is_cell_in_selection(cx, cy) {
                mask.set_bit(local_x, local_y);
            }
        }
    }

    let Some(design) = spatial.mask_design() else {
        return Ok(InclusionMask {
            mask,
            design_patch: None,
        });
    };

    match designs.elevation_patch(design, 0.0, leaf_origin, grid.cell_size()) {
        DesignLookup::Value(patch) => {
            let mut coverage = SubGridBitMask::new();
            for local_y in 0..DIMENSION {
                for local_x in 0..DIMENSION {
                    if patch.get(local_x, local_y).is_some() {
                        coverage.set_bit(local_x, local_y);
                    }
                }
            }
            mask.and_with(&coverage);
            Ok(InclusionMask {
                mask,
                design_patch: Some(patch),
            })
        }
        DesignLookup::NoElevationsInRequestedPatch => Ok(InclusionMask::empty()),
        DesignLookup::Failed { reason } => Err(QueryError::DesignLookupFailed { reason }),
    }
}
