//! The generic sub grid tree.
//!
//! A [`SubGridTree`] is an address-indexed tree of fixed fan-out: every
//! interior node holds 32×32 child slots and every leaf holds one payload
//! value covering 32×32 ground cells. The payload type is a compile-time
//! parameter, one monomorphized instantiation per use (bit mask,
//! cell-pass history), so the hot read/write path has no dynamic
//! dispatch. `L::default()` is the leaf factory.
//!
//! Child slots are `Arc`-referenced. Cloning a tree is O(1) and shares
//! every sub grid with the source; any mutation copies only the nodes on
//! the touched root-to-leaf path. A reader holding a clone therefore sees
//! a stable snapshot no matter what a writer does to its own copy.

use std::sync::Arc;

use crate::address::{CellAddress, CELLS_PER_SUB_GRID, DIMENSION, SUB_GRID_INDEX_BITS};

/// A leaf sub grid: one payload value plus its absolute origin.
#[derive(Debug)]
pub struct LeafSubGrid<L> {
    origin_x: u32,
    origin_y: u32,
    payload: L,
}

impl<L> LeafSubGrid<L> {
    /// Absolute origin of this leaf in tree-address units.
    pub fn origin(&self) -> CellAddress {
        CellAddress::new(self.origin_x, self.origin_y)
    }

    /// The leaf payload.
    pub fn payload(&self) -> &L {
        &self.payload
    }
}

impl<L: Clone> Clone for LeafSubGrid<L> {
    fn clone(&self) -> Self {
        Self {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            payload: self.payload.clone(),
        }
    }
}

/// A child slot: either an interior node or a leaf.
#[derive(Debug)]
enum Slot<L> {
    Node(Arc<NodeSubGrid<L>>),
    Leaf(Arc<LeafSubGrid<L>>),
}

// Manual impl: cloning a slot clones Arcs, never payloads, so no
// `L: Clone` bound belongs here.
impl<L> Clone for Slot<L> {
    fn clone(&self) -> Self {
        match self {
            Self::Node(n) => Self::Node(Arc::clone(n)),
            Self::Leaf(l) => Self::Leaf(Arc::clone(l)),
        }
    }
}

/// An interior node sub grid: 32×32 child slots.
#[derive(Debug)]
struct NodeSubGrid<L> {
    level: u8,
    origin_x: u32,
    origin_y: u32,
    children: Vec<Option<Slot<L>>>,
}

impl<L> NodeSubGrid<L> {
    fn new(level: u8, origin_x: u32, origin_y: u32) -> Self {
        Self {
            level,
            origin_x,
            origin_y,
            children: (0..CELLS_PER_SUB_GRID).map(|_| None).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

impl<L> Clone for NodeSubGrid<L> {
    fn clone(&self) -> Self {
        Self {
            level: self.level,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            children: self.children.clone(),
        }
    }
}

/// Sparse, fixed-fan-out spatial tree over square ground cells.
#[derive(Debug)]
pub struct SubGridTree<L> {
    num_levels: u8,
    cell_size: f64,
    index_origin_offset: u32,
    root: Arc<NodeSubGrid<L>>,
}

impl<L> Clone for SubGridTree<L> {
    /// O(1): the clone shares every sub grid with the source.
    fn clone(&self) -> Self {
        Self {
            num_levels: self.num_levels,
            cell_size: self.cell_size,
            index_origin_offset: self.index_origin_offset,
            root: Arc::clone(&self.root),
        }
    }
}

impl<L> SubGridTree<L> {
    /// Create an empty tree.
    ///
    /// `num_levels` must be in `2..=6` (the address space at 5 bits per
    /// level must fit `u32`); `cell_size` is world units per leaf cell
    /// and must be positive. Violations are programming errors.
    pub fn new(num_levels: u8, cell_size: f64) -> Self {
        assert!(
            (2..=6).contains(&num_levels),
            "sub grid tree depth must be in 2..=6, got {num_levels}"
        );
        assert!(
            cell_size > 0.0,
            "sub grid tree cell size must be positive, got {cell_size}"
        );
        Self {
            num_levels,
            cell_size,
            index_origin_offset: 1 << (SUB_GRID_INDEX_BITS * num_levels as u32 - 1),
            root: Arc::new(NodeSubGrid::new(1, 0, 0)),
        }
    }

    /// Tree depth in levels (leaves live at this level).
    pub fn num_levels(&self) -> u8 {
        self.num_levels
    }

    /// World units per leaf cell.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Bias added to world cell indices to form unsigned tree addresses.
    pub fn index_origin_offset(&self) -> u32 {
        self.index_origin_offset
    }

    /// Cells per axis representable by this tree.
    fn axial_range(&self) -> u64 {
        1u64 << (SUB_GRID_INDEX_BITS * self.num_levels as u32)
    }

    fn assert_in_range(&self, x: u32, y: u32) {
        let range = self.axial_range();
        assert!(
            (x as u64) < range && (y as u64) < range,
            "cell address ({x}, {y}) outside the range of a {}-level tree",
            self.num_levels
        );
    }

    /// Child slot index within a node at `level` for the cell at (x, y).
    fn child_index(&self, level: u8, x: u32, y: u32) -> (usize, u32) {
        let shift = SUB_GRID_INDEX_BITS * (self.num_levels - level) as u32;
        let ix = (x >> shift) & (DIMENSION - 1);
        let iy = (y >> shift) & (DIMENSION - 1);
        ((iy * DIMENSION + ix) as usize, shift)
    }

    /// Read-only descent to the leaf covering (x, y). No allocation; an
    /// absent path answers `None`.
    pub fn locate_leaf(&self, x: u32, y: u32) -> Option<&L> {
        self.locate_slot(x, y).map(|leaf| &leaf.payload)
    }

    fn locate_slot(&self, x: u32, y: u32) -> Option<&Arc<LeafSubGrid<L>>> {
        self.assert_in_range(x, y);
        let mut node = &*self.root;
        loop {
            let (idx, _) = self.child_index(node.level, x, y);
            match node.children[idx].as_ref()? {
                Slot::Leaf(leaf) => return Some(leaf),
                Slot::Node(child) => node = child,
            }
        }
    }

    /// Whether the leaf covering (x, y) in this tree is the same shared
    /// sub grid object as in `other`. Used to verify structural sharing
    /// between snapshots.
    pub fn shares_leaf_with(&self, other: &SubGridTree<L>, x: u32, y: u32) -> bool {
        match (self.locate_slot(x, y), other.locate_slot(x, y)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether the tree holds no leaves.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of leaf sub grids present.
    pub fn leaf_count(&self) -> usize {
        let mut n = 0;
        self.scan_leaves(|_| {
            n += 1;
            true
        });
        n
    }

    /// Depth-first visitation of every leaf. The visitor returns `false`
    /// to stop the scan early; the return value is `false` iff the scan
    /// was stopped.
    pub fn scan_leaves(&self, mut visitor: impl FnMut(&LeafSubGrid<L>) -> bool) -> bool {
        scan_in(&self.root, &mut visitor)
    }

    /// Descend to the leaf covering (x, y), creating missing nodes and
    /// the leaf itself on demand. Shared path nodes are copied before
    /// mutation, so clones of this tree are unaffected.
    pub fn construct_leaf(&mut self, x: u32, y: u32) -> &mut L
    where
        L: Default + Clone,
    {
        self.assert_in_range(x, y);
        let num_levels = self.num_levels;
        let mut current = &mut self.root;
        loop {
            let node = Arc::make_mut(current);
            let level = node.level;
            let shift = SUB_GRID_INDEX_BITS * (num_levels - level) as u32;
            let ix = (x >> shift) & (DIMENSION - 1);
            let iy = (y >> shift) & (DIMENSION - 1);
            let idx = (iy * DIMENSION + ix) as usize;
            let child_origin_x = node.origin_x + (ix << shift);
            let child_origin_y = node.origin_y + (iy << shift);
            let child_is_leaf = level + 1 == num_levels;

            let slot = node.children[idx].get_or_insert_with(|| {
                if child_is_leaf {
                    Slot::Leaf(Arc::new(LeafSubGrid {
                        origin_x: child_origin_x,
                        origin_y: child_origin_y,
                        payload: L::default(),
                    }))
                } else {
                    Slot::Node(Arc::new(NodeSubGrid::new(
                        level + 1,
                        child_origin_x,
                        child_origin_y,
                    )))
                }
            });

            current = match slot {
                Slot::Leaf(leaf) => return &mut Arc::make_mut(leaf).payload,
                Slot::Node(child) => child,
            };
        }
    }

    /// Copy-on-write descent to an existing leaf; never creates. Returns
    /// `None` without copying anything when the path is absent.
    pub fn leaf_mut_existing(&mut self, x: u32, y: u32) -> Option<&mut L>
    where
        L: Clone,
    {
        // Probe first so a miss never clones shared path nodes.
        self.locate_leaf(x, y)?;
        let num_levels = self.num_levels;
        let mut current = &mut self.root;
        loop {
            let node = Arc::make_mut(current);
            let level = node.level;
            let shift = SUB_GRID_INDEX_BITS * (num_levels - level) as u32;
            let ix = (x >> shift) & (DIMENSION - 1);
            let iy = (y >> shift) & (DIMENSION - 1);
            let idx = (iy * DIMENSION + ix) as usize;

            current = match node.children[idx].as_mut()? {
                Slot::Leaf(leaf) => return Some(&mut Arc::make_mut(leaf).payload),
                Slot::Node(child) => child,
            };
        }
    }

    /// Detach the leaf covering (x, y), pruning interior nodes emptied by
    /// the removal. Returns whether a leaf was removed. Clones of this
    /// tree keep the detached sub grids alive.
    pub fn remove_leaf(&mut self, x: u32, y: u32) -> bool {
        self.assert_in_range(x, y);
        if self.locate_leaf(x, y).is_none() {
            return false;
        }
        let num_levels = self.num_levels;
        remove_in(Arc::make_mut(&mut self.root), x, y, num_levels);
        true
    }

    /// World position of the center of cell (x, y).
    pub fn cell_center_position(&self, x: u32, y: u32) -> (f64, f64) {
        let off = self.index_origin_offset as f64;
        (
            (x as f64 - off + 0.5) * self.cell_size,
            (y as f64 - off + 0.5) * self.cell_size,
        )
    }

    /// World position of the south-west corner of cell (x, y).
    pub fn cell_origin_position(&self, x: u32, y: u32) -> (f64, f64) {
        let off = self.index_origin_offset as f64;
        (
            (x as f64 - off) * self.cell_size,
            (y as f64 - off) * self.cell_size,
        )
    }

    /// The cell containing world position (wx, wy), or `None` when the
    /// position falls outside the representable address range.
    pub fn world_to_cell(&self, wx: f64, wy: f64) -> Option<CellAddress> {
        let range = self.axial_range() as i64;
        let off = self.index_origin_offset as i64;
        let ix = (wx / self.cell_size).floor() as i64 + off;
        let iy = (wy / self.cell_size).floor() as i64 + off;
        if ix < 0 || iy < 0 || ix >= range || iy >= range {
            return None;
        }
        Some(CellAddress::new(ix as u32, iy as u32))
    }
}

fn scan_in<L>(
    node: &NodeSubGrid<L>,
    visitor: &mut impl FnMut(&LeafSubGrid<L>) -> bool,
) -> bool {
    for child in node.children.iter().flatten() {
        let keep_going = match child {
            Slot::Leaf(leaf) => visitor(leaf),
            Slot::Node(n) => scan_in(n, visitor),
        };
        if !keep_going {
            return false;
        }
    }
    true
}

/// Remove the leaf under (x, y) below `node`; returns whether `node`
/// itself became empty (so the caller prunes its slot too).
fn remove_in<L>(node: &mut NodeSubGrid<L>, x: u32, y: u32, num_levels: u8) -> bool {
    let shift = SUB_GRID_INDEX_BITS * (num_levels - node.level) as u32;
    let ix = (x >> shift) & (DIMENSION - 1);
    let iy = (y >> shift) & (DIMENSION - 1);
    let idx = (iy * DIMENSION + ix) as usize;

    let clear_slot = match &mut node.children[idx] {
        Some(Slot::Leaf(_)) => true,
        Some(Slot::Node(child)) => remove_in(Arc::make_mut(child), x, y, num_levels),
        None => false,
    };
    if clear_slot {
        node.children[idx] = None;
    }
    node.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> SubGridTree<u32> {
        SubGridTree::new(6, 0.34)
    }

    #[test]
    fn empty_tree_answers_absent_without_allocating() {
        let t = tree();
        assert!(t.locate_leaf(0, 0).is_none());
        assert!(t.locate_leaf(1 << 29, 1 << 29).is_none());
        assert!(t.is_empty());
        assert_eq!(t.leaf_count(), 0);
    }

    #[test]
    fn construct_then_locate_returns_same_leaf() {
        let mut t = tree();
        *t.construct_leaf(1000, 2000) = 42;
        assert_eq!(t.locate_leaf(1000, 2000), Some(&42));
        // Any address in the same 32x32 leaf region hits the same leaf.
        assert_eq!(t.locate_leaf(1023, 2015), Some(&42));
        // No sibling leaves were created as a side effect.
        assert_eq!(t.leaf_count(), 1);
        assert!(t.locate_leaf(1024, 2000).is_none());
        assert!(t.locate_leaf(1000, 2048).is_none());
    }

    #[test]
    #[should_panic(expected = "outside the range")]
    fn out_of_range_address_is_a_programming_error() {
        let t = SubGridTree::<u32>::new(2, 1.0);
        let _ = t.locate_leaf(1 << 10, 0);
    }

    #[test]
    fn remove_leaf_prunes_empty_interior_nodes() {
        let mut t = tree();
        *t.construct_leaf(5, 5) = 1;
        assert!(t.remove_leaf(5, 5));
        assert!(t.is_empty(), "interior path should be fully pruned");
        assert!(!t.remove_leaf(5, 5), "second removal is a no-op");
    }

    #[test]
    fn remove_leaf_keeps_unrelated_leaves() {
        let mut t = tree();
        *t.construct_leaf(0, 0) = 1;
        *t.construct_leaf(40, 0) = 2;
        assert!(t.remove_leaf(0, 0));
        assert_eq!(t.locate_leaf(40, 0), Some(&2));
        assert_eq!(t.leaf_count(), 1);
    }

    #[test]
    fn leaf_mut_existing_never_creates() {
        let mut t = tree();
        assert!(t.leaf_mut_existing(7, 7).is_none());
        assert!(t.is_empty());

        *t.construct_leaf(7, 7) = 9;
        *t.leaf_mut_existing(7, 7).unwrap() = 10;
        assert_eq!(t.locate_leaf(7, 7), Some(&10));
    }

    #[test]
    fn scan_visits_every_leaf_and_honors_early_stop() {
        let mut t = tree();
        *t.construct_leaf(0, 0) = 1;
        *t.construct_leaf(100, 100) = 2;
        *t.construct_leaf(5000, 5000) = 3;

        let mut values = Vec::new();
        assert!(t.scan_leaves(|leaf| {
            values.push(*leaf.payload());
            true
        }));
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 3]);

        let mut visited = 0;
        assert!(!t.scan_leaves(|_| {
            visited += 1;
            false
        }));
        assert_eq!(visited, 1);
    }

    #[test]
    fn clone_shares_structure_and_is_isolated_from_writes() {
        let mut t = tree();
        *t.construct_leaf(0, 0) = 1;
        *t.construct_leaf(4000, 4000) = 2;

        let snapshot = t.clone();
        assert!(t.shares_leaf_with(&snapshot, 0, 0));
        assert!(t.shares_leaf_with(&snapshot, 4000, 4000));

        // Writer mutates one leaf; the snapshot keeps its view and still
        // shares the untouched leaf.
        *t.construct_leaf(0, 0) = 99;
        assert_eq!(snapshot.locate_leaf(0, 0), Some(&1));
        assert_eq!(t.locate_leaf(0, 0), Some(&99));
        assert!(!t.shares_leaf_with(&snapshot, 0, 0));
        assert!(t.shares_leaf_with(&snapshot, 4000, 4000));
    }

    #[test]
    fn removal_from_clone_keeps_original_intact() {
        let mut t = tree();
        *t.construct_leaf(64, 64) = 7;
        let mut snapshot = t.clone();

        assert!(snapshot.remove_leaf(64, 64));
        assert!(snapshot.locate_leaf(64, 64).is_none());
        assert_eq!(t.locate_leaf(64, 64), Some(&7));
    }

    #[test]
    fn world_coordinate_round_trip() {
        let t = SubGridTree::<u32>::new(6, 0.5);
        let off = t.index_origin_offset();

        let (cx, cy) = t.cell_center_position(off, off);
        assert_eq!((cx, cy), (0.25, 0.25));

        let cell = t.world_to_cell(0.25, 0.25).unwrap();
        assert_eq!(cell, CellAddress::new(off, off));

        // Negative world coordinates land below the origin offset.
        let cell = t.world_to_cell(-0.25, -0.25).unwrap();
        assert_eq!(cell, CellAddress::new(off - 1, off - 1));
    }

    #[test]
    fn world_to_cell_rejects_positions_outside_address_space() {
        let t = SubGridTree::<u32>::new(2, 1.0);
        // 2 levels -> 1024 cells per axis, offset 512.
        assert!(t.world_to_cell(0.0, 0.0).is_some());
        assert!(t.world_to_cell(512.0, 0.0).is_none());
        assert!(t.world_to_cell(-513.0, 0.0).is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn construct_locate_round_trip(
                cells in prop::collection::vec((0u32..100_000, 0u32..100_000), 1..40),
            ) {
                let mut t = SubGridTree::<u64>::new(6, 0.34);
                for (i, &(x, y)) in cells.iter().enumerate() {
                    *t.construct_leaf(x, y) = i as u64;
                }
                // Every constructed address resolves to a leaf; the leaf
                // count never exceeds the number of distinct leaf regions.
                for &(x, y) in &cells {
                    prop_assert!(t.locate_leaf(x, y).is_some());
                }
                let distinct: std::collections::HashSet<_> = cells
                    .iter()
                    .map(|&(x, y)| CellAddress::new(x, y).leaf_origin())
                    .collect();
                prop_assert_eq!(t.leaf_count(), distinct.len());
            }

            #[test]
            fn world_round_trip_is_identity_on_cells(
                x in 0u32..(1 << 30),
                y in 0u32..(1 << 30),
                cell_size in 0.01f64..10.0,
            ) {
                let t = SubGridTree::<u32>::new(6, cell_size);
                let (wx, wy) = t.cell_center_position(x, y);
                let cell = t.world_to_cell(wx, wy);
                prop_assert_eq!(cell, Some(CellAddress::new(x, y)));
            }
        }
    }
}
