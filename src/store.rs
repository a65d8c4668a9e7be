//! Tabular variant store
//!
//! Holds the annotation matrix (one `Vec<String>` per row) and the sample
//! matrix (one shared slice of [`Genotype`] per row). Schema and sample
//! rows are reference counted so subset stores can alias them; annotation
//! rows are copied because they are the only editable part.
//!
//! ## Example
//!
//! ```rust,ignore
//! use varsift::{TabularStore, VarSiftConfig};
//!
//! // Memory-mapped load; "<path>.map" renames samples if present
//! let store = TabularStore::open("variants.tsv", &VarSiftConfig::default())?;
//! println!("{} rows, {} samples", store.row_count(), store.roster().len());
//! ```

use crate::config::VarSiftConfig;
use crate::lineage::StoreId;
use crate::mask::InclusionMask;
use crate::schema::{ColumnCatalog, SampleRoster, Schema};
use crate::sidecar::load_rename_map;
use crate::value_index::InternedColumn;
use crate::{Result, VarSiftError, SAMPLE_FIELDS};
use log::{info, warn};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One sample's call at one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genotype {
    pub call: String,
    pub score: String,
    pub depth: String,
}

impl Genotype {
    fn from_fields(fields: &[&str]) -> Self {
        Self {
            call: fields[0].to_string(),
            score: fields[1].to_string(),
            depth: fields[2].to_string(),
        }
    }

    /// Read depth, if it parses as an integer
    pub fn depth_value(&self) -> Option<u32> {
        self.depth.trim().parse().ok()
    }

    pub fn meets_depth(&self, min_depth: u32) -> bool {
        self.depth_value().is_some_and(|d| d >= min_depth)
    }

    pub fn fields(&self) -> [&str; SAMPLE_FIELDS] {
        [&self.call, &self.score, &self.depth]
    }
}

/// Sample name with its genotype fields for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDetail {
    pub name: String,
    pub genotype: Genotype,
}

/// Annotation rows plus per-sample genotype triples
#[derive(Debug, Clone)]
pub struct TabularStore {
    schema: Arc<Schema>,
    config: Arc<VarSiftConfig>,
    rows: Vec<Vec<String>>,
    samples: Vec<Arc<[Genotype]>>,
    gene_column: Option<InternedColumn>,
    parent: Option<StoreId>,
}

impl TabularStore {
    /// Load a file with memory mapping, applying the sidecar rename map
    pub fn open<P: AsRef<Path>>(path: P, config: &VarSiftConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(VarSiftError::EmptyInput);
        }
        let mmap = unsafe { Mmap::map(&file)? };
        let text = std::str::from_utf8(&mmap[..]).map_err(|_| VarSiftError::InvalidUtf8)?;

        let renames = read_renames(&rename_path(path, &config.rename_suffix));
        let store = Self::parse_with_renames(text, config, renames.as_ref())?;
        info!(
            "Loaded {}: {} rows, {} annotation columns, {} samples",
            path.display(),
            store.row_count(),
            store.catalog().len(),
            store.roster().len()
        );
        Ok(store)
    }

    /// Parse in-memory text (no rename map)
    pub fn parse(text: &str, config: &VarSiftConfig) -> Result<Self> {
        Self::parse_with_renames(text, config, None)
    }

    pub fn parse_with_renames(
        text: &str,
        config: &VarSiftConfig,
        renames: Option<&HashMap<String, String>>,
    ) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().ok_or(VarSiftError::EmptyInput)?;
        let header_tokens: Vec<&str> = header.split('\t').collect();

        let mut schema = Schema::from_header(&header_tokens, &config.markers)?;
        if let Some(renames) = renames {
            schema.roster.apply_renames(renames);
        }

        let width = header_tokens.len();
        let annotation_len = schema.catalog.len();
        let mut rows = Vec::new();
        let mut samples = Vec::new();

        for (i, line) in lines.enumerate() {
            let tokens: Vec<&str> = line.split('\t').collect();
            if tokens.len() != width {
                return Err(VarSiftError::ColumnCountMismatch {
                    // header is line 1
                    line: i + 2,
                    expected: width,
                    found: tokens.len(),
                });
            }
            rows.push(tokens[..annotation_len].iter().map(|t| t.to_string()).collect());
            samples.push(
                tokens[annotation_len..]
                    .chunks(SAMPLE_FIELDS)
                    .map(Genotype::from_fields)
                    .collect::<Arc<[Genotype]>>(),
            );
        }

        if u32::try_from(rows.len()).is_err() {
            return Err(VarSiftError::TooManyRows(rows.len()));
        }

        let gene_column = schema
            .catalog
            .offset(&config.columns.gene)
            .map(|col| InternedColumn::build(col, rows.iter().map(|r: &Vec<String>| r[col].as_str())));

        Ok(Self {
            schema: Arc::new(schema),
            config: Arc::new(config.clone()),
            rows,
            samples,
            gene_column,
            parent: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn catalog(&self) -> &ColumnCatalog {
        &self.schema.catalog
    }

    pub fn roster(&self) -> &SampleRoster {
        &self.schema.roster
    }

    pub fn config(&self) -> &VarSiftConfig {
        &self.config
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Mask length for this store
    pub fn mask_len(&self) -> u32 {
        // bounded at construction
        self.rows.len() as u32
    }

    pub fn full_mask(&self) -> InclusionMask {
        InclusionMask::full(self.mask_len())
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn samples(&self, row: usize) -> Option<&[Genotype]> {
        self.samples.get(row).map(|s| &s[..])
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(|s| s.as_str())
    }

    /// Interned gene-name column, when the table has one
    pub fn gene_column(&self) -> Option<&InternedColumn> {
        self.gene_column.as_ref()
    }

    /// Store this one was derived from
    pub fn parent(&self) -> Option<StoreId> {
        self.parent
    }

    /// Header plus every row, tokens exactly as loaded
    pub fn dump(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.schema.header().into_iter().map(String::from).collect());
        for (row, genotypes) in self.rows.iter().zip(&self.samples) {
            let mut line = Vec::with_capacity(self.schema.width());
            line.extend(row.iter().cloned());
            for g in genotypes.iter() {
                line.extend(g.fields().iter().map(|f| f.to_string()));
            }
            out.push(line);
        }
        out
    }

    /// Write the store back out in its input format
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        for line in self.dump() {
            writeln!(writer, "{}", line.join("\t"))?;
        }
        Ok(())
    }

    fn check_mask(&self, mask: &InclusionMask) -> Result<()> {
        if mask.len() != self.mask_len() {
            return Err(VarSiftError::MaskLengthMismatch {
                expected: self.mask_len(),
                found: mask.len(),
            });
        }
        Ok(())
    }

    /// New store with exactly the rows set in `mask`, which must be sized
    /// for this store
    pub fn subset(&self, mask: &InclusionMask, parent: Option<StoreId>) -> Result<Self> {
        self.check_mask(mask)?;
        let rows: Vec<Vec<String>> = mask.iter().map(|r| self.rows[r].clone()).collect();
        let samples = mask.iter().map(|r| self.samples[r].clone()).collect();
        let gene_column = self.gene_column.as_ref().map(|g| g.subset(mask.iter()));

        Ok(Self {
            schema: Arc::clone(&self.schema),
            config: Arc::clone(&self.config),
            rows,
            samples,
            gene_column,
            parent,
        })
    }

    /// Overwrite one annotation field, addressing the row by its position
    /// among the rows included in `visible`
    pub fn set_cell(
        &mut self,
        visible: &InclusionMask,
        visible_row: usize,
        column: usize,
        value: &str,
    ) -> Result<()> {
        if !self.catalog().is_editable(column) {
            return Err(VarSiftError::NotEditable(column));
        }
        self.check_mask(visible)?;
        let slot = visible
            .nth_included(visible_row)
            .filter(|&r| r < self.rows.len())
            .ok_or(VarSiftError::RowOutOfRange {
                row: visible_row,
                count: visible.count(),
            })?;

        self.rows[slot][column] = value.to_string();
        if let Some(gene) = self.gene_column.as_mut() {
            if gene.column() == column {
                gene.reassign(slot, value);
            }
        }
        Ok(())
    }

    /// Genotypes of one storage row, labelled with display names
    pub fn sample_detail(&self, row: usize) -> Vec<SampleDetail> {
        let Some(genotypes) = self.samples.get(row) else {
            return Vec::new();
        };
        self.roster()
            .names()
            .iter()
            .zip(genotypes.iter())
            .map(|(name, g)| SampleDetail {
                name: name.clone(),
                genotype: g.clone(),
            })
            .collect()
    }

    /// Included-row counts per gene name, sorted by gene name
    pub fn gene_counts(&self, mask: &InclusionMask) -> Result<Vec<(String, usize)>> {
        let gene = self
            .gene_column
            .as_ref()
            .ok_or_else(|| VarSiftError::UnknownColumn(self.config.columns.gene.clone()))?;
        self.check_mask(mask)?;

        let mut counts = vec![0usize; gene.index().len()];
        for row in mask.iter() {
            if let Some(id) = gene.row_id(row) {
                counts[id as usize] += 1;
            }
        }

        let mut out = Vec::new();
        for id in gene.index().sorted_ids() {
            let n = counts[id as usize];
            if n > 0 {
                out.push((gene.index().value_of(id)?.clone(), n));
            }
        }
        Ok(out)
    }
}

fn rename_path(input: &Path, suffix: &str) -> PathBuf {
    let mut os = input.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn read_renames(path: &Path) -> Option<HashMap<String, String>> {
    if !path.exists() {
        return None;
    }
    match load_rename_map(path) {
        Ok(map) => Some(map),
        Err(e) => {
            warn!("Ignoring sample rename file {}: {}", path.display(), e);
            None
        }
    }
}
