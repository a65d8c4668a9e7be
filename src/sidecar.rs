//! Auxiliary text files: sample rename map and gene lists

use crate::Result;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Read `old=new` lines; lines without `=` or with an empty side are ignored
pub fn load_rename_map<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_rename_map(&text))
}

pub fn parse_rename_map(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split('=');
            let old = parts.next()?;
            let new = parts.next()?;
            if old.is_empty() || new.is_empty() {
                None
            } else {
                Some((old.to_string(), new.to_string()))
            }
        })
        .collect()
}

/// One gene symbol per line, taken verbatim; blank lines are skipped
pub fn load_gene_set<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}
