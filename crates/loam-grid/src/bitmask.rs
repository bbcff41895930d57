//! The 32×32 bit-per-cell boolean plane.

use crate::address::DIMENSION;
use crate::extents::BoundingIntegerExtents2D;

/// A 32×32 bit plane, one bit per cell, stored as one `u32` word per row.
///
/// Bit (x, y) is bit `x` of `rows[y]`. Used both as the leaf payload of
/// an existence map (one bit per populated data sub grid) and as the
/// per-request cell inclusion mask built by the query pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubGridBitMask {
    rows: [u32; DIMENSION as usize],
}

impl SubGridBitMask {
    /// An all-clear mask.
    pub const fn new() -> Self {
        Self {
            rows: [0; DIMENSION as usize],
        }
    }

    /// Set bit (x, y). Both coordinates must be below [`DIMENSION`].
    pub fn set_bit(&mut self, x: u32, y: u32) {
        debug_assert!(x < DIMENSION && y < DIMENSION);
        self.rows[y as usize] |= 1 << x;
    }

    /// Clear bit (x, y).
    pub fn clear_bit(&mut self, x: u32, y: u32) {
        debug_assert!(x < DIMENSION && y < DIMENSION);
        self.rows[y as usize] &= !(1 << x);
    }

    /// Set or clear bit (x, y).
    pub fn assign_bit(&mut self, x: u32, y: u32, value: bool) {
        if value {
            self.set_bit(x, y);
        } else {
            self.clear_bit(x, y);
        }
    }

    /// Whether bit (x, y) is set.
    pub fn bit_is_set(&self, x: u32, y: u32) -> bool {
        debug_assert!(x < DIMENSION && y < DIMENSION);
        self.rows[y as usize] & (1 << x) != 0
    }

    /// Number of set bits.
    pub fn count_bits(&self) -> u32 {
        self.rows.iter().map(|w| w.count_ones()).sum()
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|&w| w == 0)
    }

    /// Clear every bit.
    pub fn clear(&mut self) {
        self.rows = [0; DIMENSION as usize];
    }

    /// Set every bit.
    pub fn fill(&mut self) {
        self.rows = [u32::MAX; DIMENSION as usize];
    }

    /// Bitwise OR with another mask.
    pub fn or_with(&mut self, other: &SubGridBitMask) {
        for (a, b) in self.rows.iter_mut().zip(other.rows.iter()) {
            *a |= b;
        }
    }

    /// Bitwise AND with another mask.
    pub fn and_with(&mut self, other: &SubGridBitMask) {
        for (a, b) in self.rows.iter_mut().zip(other.rows.iter()) {
            *a &= b;
        }
    }

    /// Bitwise XOR with another mask.
    pub fn xor_with(&mut self, other: &SubGridBitMask) {
        for (a, b) in self.rows.iter_mut().zip(other.rows.iter()) {
            *a ^= b;
        }
    }

    /// Invoke `f(x, y)` for every set bit, row-major.
    pub fn for_each_set_bit(&self, mut f: impl FnMut(u32, u32)) {
        for (y, &row) in self.rows.iter().enumerate() {
            let mut bits = row;
            while bits != 0 {
                let x = bits.trailing_zeros();
                f(x, y as u32);
                bits &= bits - 1;
            }
        }
    }

    /// Bounding extents of set bits in local (0..32) coordinates.
    ///
    /// Returns the inverted sentinel when the mask is empty.
    pub fn set_bit_extents(&self) -> BoundingIntegerExtents2D {
        let mut extents = BoundingIntegerExtents2D::inverted();
        for (y, &row) in self.rows.iter().enumerate() {
            if row == 0 {
                continue;
            }
            extents.include(row.trailing_zeros() as i64, y as i64);
            extents.include((31 - row.leading_zeros()) as i64, y as i64);
        }
        extents
    }

    /// Row words, for the binary codec.
    pub(crate) fn rows(&self) -> &[u32; DIMENSION as usize] {
        &self.rows
    }

    /// Construct from raw row words, for the binary codec.
    pub(crate) fn from_rows(rows: [u32; DIMENSION as usize]) -> Self {
        Self { rows }
    }
}

impl Default for SubGridBitMask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_test_clear() {
        let mut m = SubGridBitMask::new();
        assert!(m.is_empty());

        m.set_bit(0, 0);
        m.set_bit(31, 31);
        m.set_bit(5, 17);
        assert!(m.bit_is_set(0, 0));
        assert!(m.bit_is_set(31, 31));
        assert!(m.bit_is_set(5, 17));
        assert!(!m.bit_is_set(17, 5));
        assert_eq!(m.count_bits(), 3);

        m.clear_bit(5, 17);
        assert!(!m.bit_is_set(5, 17));
        assert_eq!(m.count_bits(), 2);
    }

    #[test]
    fn fill_and_clear() {
        let mut m = SubGridBitMask::new();
        m.fill();
        assert_eq!(m.count_bits(), 1024);
        m.clear();
        assert!(m.is_empty());
    }

    #[test]
    fn for_each_set_bit_visits_all_in_row_major_order() {
        let mut m = SubGridBitMask::new();
        m.set_bit(3, 1);
        m.set_bit(1, 3);
        m.set_bit(7, 1);

        let mut seen = Vec::new();
        m.for_each_set_bit(|x, y| seen.push((x, y)));
        assert_eq!(seen, vec![(3, 1), (7, 1), (1, 3)]);
    }

    #[test]
    fn set_bit_extents_tracks_corners() {
        let mut m = SubGridBitMask::new();
        assert!(!m.set_bit_extents().is_valid());

        m.set_bit(2, 5);
        m.set_bit(30, 20);
        let e = m.set_bit_extents();
        assert_eq!((e.min_x, e.min_y, e.max_x, e.max_y), (2, 5, 30, 20));
    }

    #[test]
    fn boolean_algebra() {
        let mut a = SubGridBitMask::new();
        a.set_bit(1, 1);
        a.set_bit(2, 2);
        let mut b = SubGridBitMask::new();
        b.set_bit(2, 2);
        b.set_bit(3, 3);

        let mut or = a.clone();
        or.or_with(&b);
        assert_eq!(or.count_bits(), 3);

        let mut and = a.clone();
        and.and_with(&b);
        assert_eq!(and.count_bits(), 1);
        assert!(and.bit_is_set(2, 2));

        let mut xor = a.clone();
        xor.xor_with(&b);
        assert_eq!(xor.count_bits(), 2);
        assert!(xor.bit_is_set(1, 1));
        assert!(xor.bit_is_set(3, 3));
        assert!(!xor.bit_is_set(2, 2));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_mask() -> impl Strategy<Value = SubGridBitMask> {
            prop::collection::vec((0u32..32, 0u32..32), 0..64).prop_map(|bits| {
                let mut m = SubGridBitMask::new();
                for (x, y) in bits {
                    m.set_bit(x, y);
                }
                m
            })
        }

        proptest! {
            #[test]
            fn and_with_empty_is_absorbing(m in arb_mask()) {
                let mut out = m.clone();
                out.and_with(&SubGridBitMask::new());
                prop_assert!(out.is_empty());
            }

            #[test]
            fn or_with_self_is_idempotent(m in arb_mask()) {
                let mut out = m.clone();
                out.or_with(&m);
                prop_assert_eq!(out, m);
            }

            #[test]
            fn xor_with_self_clears(m in arb_mask()) {
                let mut out = m.clone();
                let same = m.clone();
                out.xor_with(&same);
                prop_assert!(out.is_empty());
            }

            #[test]
            fn count_matches_for_each(m in arb_mask()) {
                let mut n = 0u32;
                m.for_each_set_bit(|_, _| n += 1);
                prop_assert_eq!(n, m.count_bits());
            }
        }
    }
}
