//! BED-like region lists
//!
//! Lines are `chrom start end ...`, whitespace separated. Only lines whose
//! first token starts with `chr` are read. Starts are 0-based in the file and
//! stored 1-based inclusive (`start + 1`); ends are already inclusive.
//!
//! Intervals keep file order per chromosome and lookups return the first
//! interval that contains the position, not the narrowest one.

use crate::{Result, VarSiftError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Closed interval `[start, end]`, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub end: u64,
}

impl Region {
    #[inline]
    pub fn contains(&self, pos: u64) -> bool {
        self.start <= pos && pos <= self.end
    }
}

/// Region lists keyed by chromosome
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    by_chrom: HashMap<String, Vec<Region>>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut set = Self::new();
        for (i, line) in text.lines().enumerate() {
            if !line.starts_with("chr") {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(chrom), Some(start), Some(end)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(VarSiftError::Region {
                    line: i + 1,
                    reason: "expected chrom, start and end".to_string(),
                });
            };
            let start = parse_coord(start, i + 1)?
                .checked_add(1)
                .ok_or_else(|| VarSiftError::Region {
                    line: i + 1,
                    reason: "start coordinate out of range".to_string(),
                })?;
            let end = parse_coord(end, i + 1)?;
            set.push(chrom, Region { start, end });
        }
        Ok(set)
    }

    pub fn push(&mut self, chrom: &str, region: Region) {
        self.by_chrom.entry(chrom.to_string()).or_default().push(region);
    }

    /// First interval in load order containing `pos`
    pub fn find(&self, chrom: &str, pos: u64) -> Option<&Region> {
        self.by_chrom.get(chrom)?.iter().find(|r| r.contains(pos))
    }

    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        self.find(chrom, pos).is_some()
    }

    pub fn regions(&self, chrom: &str) -> &[Region] {
        self.by_chrom.get(chrom).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn chrom_count(&self) -> usize {
        self.by_chrom.len()
    }

    pub fn len(&self) -> usize {
        self.by_chrom.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chrom.is_empty()
    }
}

fn parse_coord(token: &str, line: usize) -> Result<u64> {
    token.parse::<u64>().map_err(|_| VarSiftError::Region {
        line,
        reason: format!("invalid coordinate: {}", token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_converts_start() {
        let set = RegionSet::parse("chr1\t99\t200\tname\n").unwrap();
        assert_eq!(set.regions("chr1"), &[Region { start: 100, end: 200 }]);
        assert!(set.contains("chr1", 100));
        assert!(set.contains("chr1", 200));
        assert!(!set.contains("chr1", 99));
        assert!(!set.contains("chr1", 201));
    }

    #[test]
    fn test_non_chrom_lines_ignored() {
        let set = RegionSet::parse("track name=x\n# comment\nchr2 0 10\n1 5 9\n").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.chrom_count(), 1);
        assert!(!set.contains("1", 6));
    }

    #[test]
    fn test_first_match_on_overlap() {
        // wide interval first, narrow one nested inside it second
        let set = RegionSet::parse("chr1 0 1000\nchr1 499 510\n").unwrap();
        let hit = set.find("chr1", 505).unwrap();
        assert_eq!(*hit, Region { start: 1, end: 1000 });
    }

    #[test]
    fn test_unknown_chrom() {
        let set = RegionSet::parse("chr1 0 10\n").unwrap();
        assert!(set.find("chrX", 5).is_none());
        assert!(set.regions("chrX").is_empty());
    }

    #[test]
    fn test_bad_coordinate() {
        let err = RegionSet::parse("chr1 0 10\nchr1 abc 20\n").unwrap_err();
        assert!(matches!(err, VarSiftError::Region { line: 2, .. }));
    }

    #[test]
    fn test_start_at_coordinate_limit() {
        let err = RegionSet::parse("chr1 18446744073709551615 18446744073709551615
").unwrap_err();
        assert!(matches!(err, VarSiftError::Region { line: 1, .. }));

        let set = RegionSet::parse("chr1 18446744073709551614 18446744073709551615
").unwrap();
        assert!(set.contains("chr1", u64::MAX));
    }

    #[test]
    fn test_missing_fields() {
        assert!(RegionSet::parse("chr1 5\n").is_err());
    }
}
