//! Value interning
//!
//! Maps scalar values to dense `u32` ids in first-seen order and back.
//! Pattern searches run over the distinct values only, so filtering an
//! interned column by regex costs one match per distinct value instead of
//! one per row.

use crate::{Result, VarSiftError};
use regex::Regex;
use roaring::RoaringBitmap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Minimal contract for an internable scalar
pub trait IndexValue: Clone + Display + PartialOrd {
    /// Hashable identity of the value (floats hash by bit pattern)
    type Key: Eq + Hash;

    fn index_key(&self) -> Self::Key;

    /// Total order used for sorted listings
    fn index_cmp(&self, other: &Self) -> Ordering;
}

impl IndexValue for String {
    type Key = String;

    fn index_key(&self) -> String {
        self.clone()
    }

    fn index_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

macro_rules! impl_index_value_int {
    ($($t:ty),*) => {
        $(
            impl IndexValue for $t {
                type Key = $t;

                #[inline]
                fn index_key(&self) -> $t {
                    *self
                }

                #[inline]
                fn index_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

impl_index_value_int!(i32, i64, u32, u64);

impl IndexValue for f32 {
    type Key = u32;

    #[inline]
    fn index_key(&self) -> u32 {
        // every NaN is the same value
        if self.is_nan() {
            f32::NAN.to_bits()
        } else {
            self.to_bits()
        }
    }

    // NaN sorts after every number
    #[inline]
    fn index_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl IndexValue for f64 {
    type Key = u64;

    #[inline]
    fn index_key(&self) -> u64 {
        if self.is_nan() {
            f64::NAN.to_bits()
        } else {
            self.to_bits()
        }
    }

    #[inline]
    fn index_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// Bidirectional value <-> id interner
#[derive(Debug, Clone)]
pub struct ValueIndex<T: IndexValue> {
    values: Vec<T>,
    ids: HashMap<T::Key, u32>,
}

impl<T: IndexValue> Default for ValueIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IndexValue> ValueIndex<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            ids: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            ids: HashMap::with_capacity(capacity),
        }
    }

    /// Lookup only, never inserts
    pub fn id_of(&self, value: &T) -> Option<u32> {
        self.ids.get(&value.index_key()).copied()
    }

    /// Return the existing id or assign the next one
    pub fn intern(&mut self, value: T) -> u32 {
        let key = value.index_key();
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.values.len() as u32;
        self.values.push(value);
        self.ids.insert(key, id);
        id
    }

    pub fn value_of(&self, id: u32) -> Result<&T> {
        self.values
            .get(id as usize)
            .ok_or(VarSiftError::UnknownIndexId(id))
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ids whose rendered text contains a match for `pattern`
    pub fn matching(&self, pattern: &Regex) -> RoaringBitmap {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| pattern.is_match(&v.to_string()))
            .map(|(id, _)| id as u32)
            .collect()
    }

    /// Compile `pattern` and search with it
    pub fn matching_pattern(&self, pattern: &str) -> Result<RoaringBitmap> {
        let re = Regex::new(pattern)?;
        Ok(self.matching(&re))
    }

    /// All ids ordered by their values
    pub fn sorted_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = (0..self.values.len() as u32).collect();
        ids.sort_by(|&a, &b| self.values[a as usize].index_cmp(&self.values[b as usize]));
        ids
    }

    /// `(id, value)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.values.iter().enumerate().map(|(i, v)| (i as u32, v))
    }
}

impl ValueIndex<String> {
    /// Intern a borrowed string, allocating only for new values
    pub fn intern_str(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.ids.get(value) {
            return id;
        }
        self.intern(value.to_string())
    }

    pub fn id_of_str(&self, value: &str) -> Option<u32> {
        self.ids.get(value).copied()
    }
}

/// One annotation column stored as per-row ids into a [`ValueIndex`]
#[derive(Debug, Clone)]
pub struct InternedColumn {
    column: usize,
    index: ValueIndex<String>,
    ids: Vec<u32>,
}

impl InternedColumn {
    pub fn build<'a, I>(column: usize, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = ValueIndex::new();
        let ids = values.into_iter().map(|v| index.intern_str(v)).collect();
        Self { column, index, ids }
    }

    /// Catalog offset of the column this was built from
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn index(&self) -> &ValueIndex<String> {
        &self.index
    }

    pub fn row_id(&self, row: usize) -> Option<u32> {
        self.ids.get(row).copied()
    }

    /// Rows whose value matches `pattern`
    pub fn rows_matching(&self, pattern: &Regex) -> Vec<usize> {
        let hits = self.index.matching(pattern);
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, id)| hits.contains(**id))
            .map(|(row, _)| row)
            .collect()
    }

    /// Point `row` at a new value after a cell edit
    pub fn reassign(&mut self, row: usize, value: &str) {
        if row < self.ids.len() {
            let id = self.index.intern_str(value);
            self.ids[row] = id;
        }
    }

    /// Restrict to the given rows, keeping the same ids
    pub fn subset<I>(&self, rows: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        Self {
            column: self.column,
            index: self.index.clone(),
            ids: rows.into_iter().map(|r| self.ids[r]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut index = ValueIndex::new();
        let a = index.intern("BRCA1".to_string());
        let b = index.intern("BRCA1".to_string());
        assert_eq!(a, b);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_ids_dense_in_first_seen_order() {
        let mut index = ValueIndex::new();
        let ids: Vec<u32> = ["TP53", "BRCA1", "TP53", "EGFR"]
            .iter()
            .map(|s| index.intern_str(s))
            .collect();
        assert_eq!(ids, vec![0, 1, 0, 2]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_value_of_inverts_intern() {
        let mut index = ValueIndex::new();
        for v in [1.5f32, -0.25, 1e6, 3.0] {
            let id = index.intern(v);
            assert_eq!(*index.value_of(id).unwrap(), v);
            assert_eq!(index.id_of(&v), Some(id));
        }
    }

    #[test]
    fn test_value_of_unknown_id() {
        let index: ValueIndex<i64> = ValueIndex::new();
        assert!(matches!(
            index.value_of(7),
            Err(VarSiftError::UnknownIndexId(7))
        ));
    }

    #[test]
    fn test_id_of_does_not_insert() {
        let mut index = ValueIndex::new();
        index.intern(5i32);
        assert_eq!(index.id_of(&9), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_nan_interns_once() {
        let mut index = ValueIndex::new();
        let a = index.intern(f64::NAN);
        let b = index.intern(-f64::NAN);
        assert_eq!(a, b);
    }

    #[test]
    fn test_matching_over_rendered_text() {
        let mut index = ValueIndex::new();
        index.intern(0.5f32);
        index.intern(12.5f32);
        index.intern(3.0f32);

        let hits = index.matching_pattern(r"\.5$").unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_invalid_pattern() {
        let index: ValueIndex<String> = ValueIndex::new();
        assert!(index.matching_pattern("(unclosed").is_err());
    }

    #[test]
    fn test_sorted_ids() {
        let mut index = ValueIndex::new();
        for v in [30u32, 10, 20] {
            index.intern(v);
        }
        assert_eq!(index.sorted_ids(), vec![1, 2, 0]);
    }

    #[test]
    fn test_sorted_ids_with_nan() {
        let mut index = ValueIndex::new();
        for v in [3.0f64, f64::NAN, -0.5, 1.0] {
            index.intern(v);
        }
        assert_eq!(index.sorted_ids(), vec![2, 3, 0, 1]);

        let mut index = ValueIndex::new();
        for v in [f32::NAN, 2.0f32, f32::NAN, -1.0] {
            index.intern(v);
        }
        assert_eq!(index.sorted_ids(), vec![2, 1, 0]);
    }

    #[test]
    fn test_interned_column_rows_matching() {
        let column = InternedColumn::build(1, ["BRCA1", "TP53", "BRCA2", "BRCA1"]);
        let re = Regex::new("^BRCA").unwrap();
        assert_eq!(column.rows_matching(&re), vec![0, 2, 3]);
        assert_eq!(column.index().len(), 3);
    }

    #[test]
    fn test_interned_column_reassign() {
        let mut column = InternedColumn::build(0, ["a", "b"]);
        column.reassign(1, "a");
        assert_eq!(column.row_id(1), Some(0));
        column.reassign(0, "c");
        assert_eq!(column.row_id(0), Some(2));
    }

    #[test]
    fn test_interned_column_subset() {
        let column = InternedColumn::build(0, ["a", "b", "c"]);
        let sub = column.subset([2, 0]);
        assert_eq!(sub.row_id(0), Some(2));
        assert_eq!(sub.row_id(1), Some(0));
        assert_eq!(sub.row_id(2), None);
    }
}
