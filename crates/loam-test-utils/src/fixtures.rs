//! Reusable site model fixtures.
//!
//! Standard building blocks for pipeline tests: chronological pass
//! histories with known elevations and a transient site model populated
//! with them.

use loam_core::{CellPass, MachineId, ProjectId, Timestamp};
use loam_grid::CellAddress;
use loam_model::SiteModel;

/// A pass at the given whole-second time and height, machine 1.
pub fn pass_at(secs: i64, height: f32) -> CellPass {
    CellPass::at(Timestamp::from_seconds(secs), height, MachineId(1))
}

/// A chronological history of `count` passes starting at `start_secs`,
/// one pass per `step_secs`, each `rise` higher than the last.
pub fn rising_history(start_secs: i64, count: usize, step_secs: i64, rise: f32) -> Vec<CellPass> {
    (0..count)
        .map(|i| pass_at(start_secs + i as i64 * step_secs, i as f32 * rise))
        .collect()
}

/// A transient six-level model with one populated cell.
pub fn single_cell_model(address: CellAddress, passes: &[CellPass]) -> SiteModel {
    let mut model = SiteModel::transient(ProjectId(1), 6, 1.0);
    let leaf = model.grid_mut().construct_leaf(address.x, address.y);
    let (local_x, local_y) = address.local();
    for pass in passes {
        leaf.add_pass(local_x, local_y, *pass);
    }
    model
}

/// A transient six-level model with one pass in each of a row of cells,
/// the pass height equal to the cell's x address.
pub fn row_model(y: u32, x_range: std::ops::Range<u32>) -> SiteModel {
    let mut model = SiteModel::transient(ProjectId(1), 6, 1.0);
    for x in x_range {
        let leaf = model.grid_mut().construct_leaf(x, y);
        let (local_x, local_y) = CellAddress::new(x, y).local();
        leaf.add_pass(local_x, local_y, pass_at(10, x as f32));
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_history_is_chronological() {
        let history = rising_history(100, 4, 60, 0.25);
        assert_eq!(history.len(), 4);
        for pair in history.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
        assert_eq!(history[3].height, 0.75);
    }

    #[test]
    fn single_cell_model_holds_the_passes() {
        let address = CellAddress::new(1000, 2000);
        let model = single_cell_model(address, &rising_history(0, 3, 60, 1.0));
        let leaf = model.grid().locate_leaf(address.x, address.y).unwrap();
        let (lx, ly) = address.local();
        assert_eq!(leaf.passes(lx, ly).len(), 3);
    }
}
