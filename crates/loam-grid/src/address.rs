//! Tree-address constants and the cell address type.
//!
//! World coordinates are signed; tree addresses are unsigned. A tree's
//! index origin offset biases world cell indices into the middle of the
//! address space, so a world position is recovered as
//! `(address - origin_offset) * cell_size`.

use std::fmt;

/// Index bits consumed per tree level (5 bits, 32 child slots per axis).
pub const SUB_GRID_INDEX_BITS: u32 = 5;

/// Cells per sub grid side.
pub const DIMENSION: u32 = 1 << SUB_GRID_INDEX_BITS;

/// Cells (or child slots) per sub grid.
pub const CELLS_PER_SUB_GRID: usize = (DIMENSION * DIMENSION) as usize;

/// An on-the-ground cell address in unsigned tree-address units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// East-west tree address.
    pub x: u32,
    /// North-south tree address.
    pub y: u32,
}

impl CellAddress {
    /// Construct an address.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The origin of the leaf sub grid containing this cell.
    pub const fn leaf_origin(self) -> Self {
        Self {
            x: self.x & !(DIMENSION - 1),
            y: self.y & !(DIMENSION - 1),
        }
    }

    /// The cell's offset within its leaf sub grid.
    pub const fn local(self) -> (u32, u32) {
        (self.x & (DIMENSION - 1), self.y & (DIMENSION - 1))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_origin_masks_low_bits() {
        let a = CellAddress::new(1000, 2049);
        assert_eq!(a.leaf_origin(), CellAddress::new(992, 2048));
        assert_eq!(a.local(), (8, 1));
    }

    #[test]
    fn origin_cell_is_its_own_leaf_origin() {
        let a = CellAddress::new(64, 96);
        assert_eq!(a.leaf_origin(), a);
        assert_eq!(a.local(), (0, 0));
    }
}
