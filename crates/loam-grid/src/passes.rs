//! Cell-pass history leaf payload.

use loam_core::{CellPass, Timestamp};

use crate::address::{CELLS_PER_SUB_GRID, DIMENSION};

/// Leaf payload holding the chronologically ordered cell-pass history of
/// each of the sub grid's 32×32 cells.
#[derive(Clone, Debug)]
pub struct CellPassLeaf {
    cells: Vec<Vec<CellPass>>,
}

impl CellPassLeaf {
    fn cell_index(local_x: u32, local_y: u32) -> usize {
        debug_assert!(local_x < DIMENSION && local_y < DIMENSION);
        (local_y * DIMENSION + local_x) as usize
    }

    /// The pass history of cell (local_x, local_y), oldest first.
    pub fn passes(&self, local_x: u32, local_y: u32) -> &[CellPass] {
        &self.cells[Self::cell_index(local_x, local_y)]
    }

    /// Insert a pass into cell (local_x, local_y), preserving
    /// chronological order. Equal-time passes keep arrival order.
    pub fn add_pass(&mut self, local_x: u32, local_y: u32, pass: CellPass) {
        let cell = &mut self.cells[Self::cell_index(local_x, local_y)];
        let at = cell.partition_point(|p| p.time <= pass.time);
        cell.insert(at, pass);
    }

    /// Whether cell (local_x, local_y) holds any passes.
    pub fn cell_has_data(&self, local_x: u32, local_y: u32) -> bool {
        !self.cells[Self::cell_index(local_x, local_y)].is_empty()
    }

    /// Whether every cell is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.is_empty())
    }

    /// Total pass count across all cells.
    pub fn pass_count(&self) -> usize {
        self.cells.iter().map(|c| c.len()).sum()
    }

    /// Time of the earliest and latest pass held anywhere in the leaf,
    /// or `None` when empty.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let mut range: Option<(Timestamp, Timestamp)> = None;
        for cell in &self.cells {
            let (Some(first), Some(last)) = (cell.first(), cell.last()) else {
                continue;
            };
            range = Some(match range {
                None => (first.time, last.time),
                Some((lo, hi)) => (lo.min(first.time), hi.max(last.time)),
            });
        }
        range
    }
}

impl Default for CellPassLeaf {
    fn default() -> Self {
        Self {
            cells: vec![Vec::new(); CELLS_PER_SUB_GRID],
        }
    }
}
