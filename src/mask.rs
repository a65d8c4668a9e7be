//! Row inclusion masks
//!
//! A thin wrapper over [`RoaringBitmap`] that remembers how many rows the
//! owning store has, so "all rows" and complements stay well defined.

use roaring::RoaringBitmap;

/// Bitset over `0..len`; bit i set means row i is included
#[derive(Debug, Clone, PartialEq)]
pub struct InclusionMask {
    bits: RoaringBitmap,
    len: u32,
}

impl InclusionMask {
    /// Every row included
    pub fn full(len: u32) -> Self {
        let mut bits = RoaringBitmap::new();
        bits.insert_range(0..len);
        Self { bits, len }
    }

    /// No row included
    pub fn empty(len: u32) -> Self {
        Self {
            bits: RoaringBitmap::new(),
            len,
        }
    }

    /// Evaluate `predicate` once per row
    pub fn from_predicate<F>(len: u32, mut predicate: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let mut bits = RoaringBitmap::new();
        for row in 0..len {
            if predicate(row as usize) {
                bits.insert(row);
            }
        }
        Self { bits, len }
    }

    /// Build from explicit row numbers; rows `>= len` are dropped
    pub fn from_rows<I>(len: u32, rows: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let bits = rows
            .into_iter()
            .filter(|&r| r < len as usize)
            .map(|r| r as u32)
            .collect();
        Self { bits, len }
    }

    /// Number of rows in the owning store
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of included rows
    pub fn count(&self) -> usize {
        self.bits.len() as usize
    }

    pub fn is_full(&self) -> bool {
        self.bits.len() == u64::from(self.len)
    }

    pub fn contains(&self, row: usize) -> bool {
        row < self.len as usize && self.bits.contains(row as u32)
    }

    pub fn insert(&mut self, row: usize) {
        if row < self.len as usize {
            self.bits.insert(row as u32);
        }
    }

    pub fn remove(&mut self, row: usize) {
        if row < self.len as usize {
            self.bits.remove(row as u32);
        }
    }

    pub fn intersect_with(&mut self, other: &InclusionMask) {
        self.bits &= &other.bits;
    }

    pub fn union_with(&mut self, other: &InclusionMask) {
        self.bits |= &other.bits;
        self.bits.remove_range(self.len..);
    }

    /// Included rows in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().map(|r| r as usize)
    }

    /// Storage row of the `n`-th included row (0-based)
    pub fn nth_included(&self, n: usize) -> Option<usize> {
        self.bits.iter().nth(n).map(|r| r as usize)
    }

    pub fn bitmap(&self) -> &RoaringBitmap {
        &self.bits
    }
}
