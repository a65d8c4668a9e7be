//! Compound-heterozygous pairing
//!
//! Given row keys `[anchor, partner1, partner2, ...]` resolved against the
//! designated unique-key column, produce one record per partner:
//!
//! ```text
//! gene  chrom  flank  score  type  [samples...] │ flank  score  type  [samples...]
//! └────────────── anchor summary ─────────────┘ └──── partner, minus gene/chrom ──┘
//! ```
//!
//! Pairing always reads the whole store, never a filtered view.

use crate::store::TabularStore;
use crate::{Result, VarSiftError, SAMPLE_FIELDS};
use std::collections::HashMap;

/// Number of leading summary fields shared by anchor and partner (gene, chrom)
const SHARED_PREFIX: usize = 2;

/// Resolved offsets of the columns that make up a pairing summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingLayout {
    pub row_key: usize,
    pub gene: usize,
    pub chrom: usize,
    pub left_flank: usize,
    pub score: usize,
    pub variant_type: usize,
}

impl PairingLayout {
    pub fn resolve(store: &TabularStore) -> Result<Self> {
        let catalog = store.catalog();
        let names = &store.config().columns;
        Ok(Self {
            row_key: catalog.require(&names.row_key)?,
            gene: catalog.require(&names.gene)?,
            chrom: catalog.require(&names.chrom)?,
            left_flank: catalog.require(&names.left_flank)?,
            score: catalog.require(&names.score)?,
            variant_type: catalog.require(&names.variant_type)?,
        })
    }

    fn summary_columns(&self) -> [usize; 5] {
        [self.gene, self.chrom, self.left_flank, self.score, self.variant_type]
    }

    /// Summary of one storage row
    fn summarize(&self, store: &TabularStore, row: usize, include_samples: bool) -> Vec<String> {
        let Some(fields) = store.row(row) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .summary_columns()
            .iter()
            .map(|&c| fields[c].clone())
            .collect();
        if include_samples {
            if let Some(genotypes) = store.samples(row) {
                out.reserve(genotypes.len() * SAMPLE_FIELDS);
                for g in genotypes.iter() {
                    out.extend(g.fields().iter().map(|f| f.to_string()));
                }
            }
        }
        out
    }
}

/// Column names for the records returned by [`pair_compound_het`]
pub fn pairing_header(store: &TabularStore, include_samples: bool) -> Result<Vec<String>> {
    let layout = PairingLayout::resolve(store)?;
    let catalog = store.catalog();
    let mut summary: Vec<String> = layout
        .summary_columns()
        .iter()
        .filter_map(|&c| catalog.name(c).map(String::from))
        .collect();
    if include_samples {
        summary.extend(store.roster().header_tokens().iter().cloned());
    }

    let mut header = summary.clone();
    header.extend(summary.into_iter().skip(SHARED_PREFIX));
    Ok(header)
}

/// One composite record per partner key
pub fn pair_compound_het<S: AsRef<str>>(
    store: &TabularStore,
    keys: &[S],
    include_samples: bool,
) -> Result<Vec<Vec<String>>> {
    let Some((anchor, partners)) = keys.split_first() else {
        return Err(VarSiftError::EmptyPairing);
    };
    let layout = PairingLayout::resolve(store)?;

    // a key held by several rows resolves to the last of them
    let mut found: HashMap<&str, Option<usize>> =
        keys.iter().map(|k| (k.as_ref(), None)).collect();
    for (row, fields) in store.rows().iter().enumerate() {
        if let Some(slot) = found.get_mut(fields[layout.row_key].as_str()) {
            *slot = Some(row);
        }
    }

    let lookup = |key: &str| -> Result<usize> {
        found
            .get(key)
            .copied()
            .flatten()
            .ok_or_else(|| VarSiftError::UnknownRowKey(key.to_string()))
    };

    let anchor_summary = layout.summarize(store, lookup(anchor.as_ref())?, include_samples);
    let mut out = Vec::with_capacity(partners.len());
    for partner in partners {
        let partner_summary = layout.summarize(store, lookup(partner.as_ref())?, include_samples);
        let mut record = Vec::with_capacity((anchor_summary.len() * 2).saturating_sub(SHARED_PREFIX));
        record.extend(anchor_summary.iter().cloned());
        record.extend(partner_summary.into_iter().skip(SHARED_PREFIX));
        out.push(record);
    }
    Ok(out)
}
