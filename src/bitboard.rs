//! A fixed-size cell mask using const generics.
//!
//! An `N×N` grid is packed into the unsigned integer `T`, one bit per cell,
//! using the same x-major flattening as [`Coordinate::index`]. Boards use one
//! mask per cell layer (ships, hits, misses) and combine them with the bitwise
//! operators.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign, Not};

use num_traits::{PrimInt, Unsigned, Zero};

use crate::common::Coordinate;

/// A fixed-size N×N set of cells stored in the unsigned integer `T`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitBoard<T, const N: usize>
where
    T: PrimInt + Unsigned + Zero,
{
    bits: T,
}

impl<T, const N: usize> BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    const CELLS: usize = N * N;

    // Rejects `T` too narrow for the grid at compile time.
    const FITS: () = assert!(N * N <= core::mem::size_of::<T>() * 8);

    #[inline]
    fn board_mask() -> T {
        if Self::CELLS == core::mem::size_of::<T>() * 8 {
            !T::zero()
        } else {
            (T::one() << Self::CELLS) - T::one()
        }
    }

    #[inline]
    fn bit(coord: Coordinate) -> Option<T> {
        let (x, y) = (coord.x as usize, coord.y as usize);
        if x >= N || y >= N {
            return None;
        }
        Some(T::one() << (x * N + y))
    }

    /// Create an empty mask.
    #[inline]
    pub fn new() -> Self {
        let () = Self::FITS;
        BitBoard { bits: T::zero() }
    }

    /// Number of set cells.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_zero()
    }

    /// Returns `true` if `coord` is set. Off-grid coordinates are never set.
    pub fn contains(&self, coord: Coordinate) -> bool {
        Self::bit(coord).is_some_and(|bit| !(self.bits & bit).is_zero())
    }

    /// Set `coord`. Returns `false` (and changes nothing) when it is off the grid.
    pub fn insert(&mut self, coord: Coordinate) -> bool {
        match Self::bit(coord) {
            Some(bit) => {
                self.bits = self.bits | bit;
                true
            }
            None => false,
        }
    }

    /// Clear every cell.
    #[inline]
    pub fn clear(&mut self) {
        self.bits = T::zero();
    }

    /// Returns `true` when the two masks share at least one cell.
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.bits & other.bits).is_zero()
    }

    /// Iterator over the set cells in index order.
    pub fn iter(&self) -> Cells<T, N> {
        Cells {
            bits: self.bits,
            idx: 0,
        }
    }
}

impl<T, const N: usize> Default for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> FromIterator<Coordinate> for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    /// Off-grid coordinates are skipped.
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        let mut board = Self::new();
        for coord in iter {
            board.insert(coord);
        }
        board
    }
}

impl<T, const N: usize> fmt::Debug for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the set cells of a mask.
#[derive(Clone, Copy)]
pub struct Cells<T, const N: usize> {
    bits: T,
    idx: usize,
}

impl<T, const N: usize> Iterator for Cells<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    type Item = Coordinate;

    fn next(&mut self) -> Option<Self::Item> {
        while self.idx < N * N {
            let idx = self.idx;
            self.idx += 1;
            if !((self.bits >> idx) & T::one()).is_zero() {
                return Some(Coordinate::new((idx / N) as u8, (idx % N) as u8));
            }
        }
        None
    }
}

impl<T, const N: usize> BitAnd for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        BitBoard {
            bits: self.bits & rhs.bits,
        }
    }
}

impl<T, const N: usize> BitOr for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        BitBoard {
            bits: self.bits | rhs.bits,
        }
    }
}

impl<T, const N: usize> BitOrAssign for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits = self.bits | rhs.bits;
    }
}

/// Complement within the grid.
impl<T, const N: usize> Not for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    type Output = Self;
    fn not(self) -> Self {
        BitBoard {
            bits: !self.bits & Self::board_mask(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type BB = BitBoard<u128, 10>;

    #[test]
    fn insert_contains_and_iterate_in_index_order() {
        let mut bb = BB::new();
        assert!(bb.insert(Coordinate::new(3, 1)));
        assert!(bb.insert(Coordinate::new(0, 9)));
        assert!(!bb.insert(Coordinate::new(10, 0)));
        assert!(bb.contains(Coordinate::new(3, 1)));
        assert!(!bb.contains(Coordinate::new(1, 3)));
        assert_eq!(bb.len(), 2);
        let cells: Vec<_> = bb.iter().collect();
        assert_eq!(cells, vec![Coordinate::new(0, 9), Coordinate::new(3, 1)]);
    }

    #[test]
    fn complement_stays_inside_grid() {
        let full = !BB::new();
        assert_eq!(full.len(), 100);
        assert!(!full.contains(Coordinate::new(10, 10)));
    }

    #[test]
    fn masks_combine() {
        let a: BB = [Coordinate::new(0, 0), Coordinate::new(1, 1)].into_iter().collect();
        let b: BB = [Coordinate::new(1, 1), Coordinate::new(2, 2)].into_iter().collect();
        assert!(a.intersects(&b));
        assert_eq!((a & b).iter().collect::<Vec<_>>(), vec![Coordinate::new(1, 1)]);
        assert_eq!((a | b).len(), 3);
        assert_eq!((!a & a).len(), 0);
    }
}
