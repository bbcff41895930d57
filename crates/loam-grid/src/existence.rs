//! The existence map: one bit per populated data leaf region.
//!
//! An [`ExistenceMap`] is a [`SubGridTree`] of [`SubGridBitMask`] leaves,
//! one level shallower than the data tree it describes: each map cell
//! covers one 32×32 leaf sub grid of the companion data tree. A set bit
//! means "that leaf exists and holds at least one non-null cell". The map
//! may be conservative (a bit may remain set after the last pass under it
//! is removed) but must never claim a populated leaf as empty.

use crate::address::{CellAddress, DIMENSION, SUB_GRID_INDEX_BITS};
use crate::bitmask::SubGridBitMask;
use crate::extents::{BoundingExtents3D, BoundingIntegerExtents2D};
use crate::tree::SubGridTree;

/// Bit-per-leaf-region presence map for a data tree.
#[derive(Clone, Debug)]
pub struct ExistenceMap {
    tree: SubGridTree<SubGridBitMask>,
}

impl ExistenceMap {
    /// Create an empty map describing a data tree of `data_num_levels`
    /// levels and `data_cell_size` world units per cell.
    ///
    /// The map itself is one level shallower with 32× coarser cells, so
    /// map address = data address >> [`SUB_GRID_INDEX_BITS`].
    pub fn new(data_num_levels: u8, data_cell_size: f64) -> Self {
        Self {
            tree: SubGridTree::new(
                data_num_levels - 1,
                data_cell_size * DIMENSION as f64,
            ),
        }
    }

    /// Reconstitute a map from its stored tree parameters: `num_levels`
    /// map tree levels over `region_size` world units per map cell.
    pub(crate) fn from_raw(num_levels: u8, region_size: f64) -> Self {
        Self {
            tree: SubGridTree::new(num_levels, region_size),
        }
    }

    /// The underlying bitmask tree (for persistence).
    pub(crate) fn tree(&self) -> &SubGridTree<SubGridBitMask> {
        &self.tree
    }

    /// The underlying bitmask tree, mutable (for persistence).
    pub(crate) fn tree_mut(&mut self) -> &mut SubGridTree<SubGridBitMask> {
        &mut self.tree
    }

    /// Set or clear the bit for the map cell at (x, y) in map-address
    /// units. Clearing the last bit of a mask leaf detaches the leaf.
    pub fn set_cell(&mut self, x: u32, y: u32, value: bool) {
        if value {
            let (lx, ly) = CellAddress::new(x, y).local();
            self.tree.construct_leaf(x, y).set_bit(lx, ly);
        } else if let Some(mask) = self.tree.leaf_mut_existing(x, y) {
            let (lx, ly) = CellAddress::new(x, y).local();
            mask.clear_bit(lx, ly);
            if mask.is_empty() {
                self.tree.remove_leaf(x, y);
            }
        }
    }

    /// Whether the bit for the map cell at (x, y) is set.
    pub fn cell_is_set(&self, x: u32, y: u32) -> bool {
        let (lx, ly) = CellAddress::new(x, y).local();
        self.tree
            .locate_leaf(x, y)
            .is_some_and(|mask| mask.bit_is_set(lx, ly))
    }

    /// Mark the data leaf region containing the data-tree address as
    /// populated.
    pub fn set_for_data_address(&mut self, addr: CellAddress) {
        self.set_cell(addr.x >> SUB_GRID_INDEX_BITS, addr.y >> SUB_GRID_INDEX_BITS, true);
    }

    /// Clear the mark for the data leaf region containing the data-tree
    /// address.
    pub fn clear_for_data_address(&mut self, addr: CellAddress) {
        self.set_cell(
            addr.x >> SUB_GRID_INDEX_BITS,
            addr.y >> SUB_GRID_INDEX_BITS,
            false,
        );
    }

    /// Number of set bits (populated data leaf regions).
    pub fn count_bits(&self) -> u64 {
        let mut n = 0u64;
        self.tree.scan_leaves(|leaf| {
            n += leaf.payload().count_bits() as u64;
            true
        });
        n
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        let mut any = false;
        self.tree.scan_leaves(|leaf| {
            any = !leaf.payload().is_empty();
            !any
        });
        !any
    }

    /// Bitwise OR: mark every region marked in `other`.
    pub fn or_with(&mut self, other: &ExistenceMap) {
        other.tree.scan_leaves(|leaf| {
            let origin = leaf.origin();
            self.tree
                .construct_leaf(origin.x, origin.y)
                .or_with(leaf.payload());
            true
        });
    }

    /// Bitwise AND: keep only regions marked in both maps.
    ///
    /// Iterates the leaves of `self`: a sub grid absent in `self` is
    /// implicitly all-false and AND against anything stays false, so
    /// regions present only in `other` are skipped without allocating.
    /// Leaves emptied (or unmatched in `other`) are detached.
    pub fn and_with(&mut self, other: &ExistenceMap) {
        let origins = self.leaf_origins();
        for origin in origins {
            let emptied = match other.tree.locate_leaf(origin.x, origin.y) {
                None => true,
                Some(other_mask) => {
                    // Leaf exists in self by construction of `origins`;
                    // combine in place.
                    match self.tree.leaf_mut_existing(origin.x, origin.y) {
                        Some(mask) => {
                            mask.and_with(other_mask);
                            mask.is_empty()
                        }
                        None => false,
                    }
                }
            };
            if emptied {
                self.tree.remove_leaf(origin.x, origin.y);
            }
        }
    }

    /// Bitwise XOR: toggle every region marked in `other`.
    pub fn xor_with(&mut self, other: &ExistenceMap) {
        other.tree.scan_leaves(|leaf| {
            let origin = leaf.origin();
            self.tree
                .construct_leaf(origin.x, origin.y)
                .xor_with(leaf.payload());
            true
        });
        // XOR can zero out whole leaves; detach them.
        for origin in self.leaf_origins() {
            if self
                .tree
                .locate_leaf(origin.x, origin.y)
                .is_some_and(SubGridBitMask::is_empty)
            {
                self.tree.remove_leaf(origin.x, origin.y);
            }
        }
    }

    fn leaf_origins(&self) -> Vec<CellAddress> {
        let mut origins = Vec::new();
        self.tree.scan_leaves(|leaf| {
            origins.push(leaf.origin());
            true
        });
        origins
    }

    /// Invoke the visitor with the **data-tree leaf origin** address of
    /// every set bit: map bit (mx, my) covers the data sub grid whose
    /// origin is `(mx << 5, my << 5)`.
    pub fn scan_set_bits_as_addresses(&self, mut visitor: impl FnMut(CellAddress)) {
        self.tree.scan_leaves(|leaf| {
            let origin = leaf.origin();
            leaf.payload().for_each_set_bit(|bx, by| {
                visitor(CellAddress::new(
                    (origin.x + bx) << SUB_GRID_INDEX_BITS,
                    (origin.y + by) << SUB_GRID_INDEX_BITS,
                ));
            });
            true
        });
    }

    /// World-space bounding extents of all set bits.
    ///
    /// Only the plan axes are populated (the map knows nothing of
    /// elevation). Returns the inverted sentinel when no bits are set;
    /// callers must check [`BoundingExtents3D::is_valid`].
    pub fn compute_world_extents(&self) -> BoundingExtents3D {
        let mut extents = BoundingExtents3D::inverted();
        let region_size = self.tree.cell_size();
        self.tree.scan_leaves(|leaf| {
            let origin = leaf.origin();
            leaf.payload().for_each_set_bit(|bx, by| {
                let (wx, wy) = self.tree.cell_origin_position(origin.x + bx, origin.y + by);
                extents.include_point(wx, wy);
                extents.include_point(wx + region_size, wy + region_size);
            });
            true
        });
        extents
    }

    /// Map-address-space bounding extents of all set bits. Returns the
    /// inverted sentinel when no bits are set.
    pub fn compute_cell_address_extents(&self) -> BoundingIntegerExtents2D {
        let mut extents = BoundingIntegerExtents2D::inverted();
        self.tree.scan_leaves(|leaf| {
            let origin = leaf.origin();
            leaf.payload().for_each_set_bit(|bx, by| {
                extents.include((origin.x + bx) as i64, (origin.y + by) as i64);
            });
            true
        });
        extents
    }
}
