//! # varsift
//!
//! In-memory variant table store with composable row filters.
//!
//! A variant table is a tab-delimited file with one row per variant call:
//! a prefix of annotation columns followed by one `genotype / score / depth`
//! triple per sample. varsift loads it once, classifies the samples from
//! the header text (affected/normal pairs, case and control cohorts) and then
//! answers filter queries by producing an [`InclusionMask`] per query.
//!
//! ## Pipeline
//!
//! ```text
//! Input file ──► Schema (catalog + roster) ──► TabularStore
//!                                                  │
//!            FilterConfig ──► apply_filters ◄──────┤
//!                                 │                │
//!                      InclusionMask ──► Session views / subset stores
//! ```
//!
//! ## Example
//!
//! ```rust
//! use varsift::{apply_filters, FilterConfig, TabularStore, VarSiftConfig, VariantType};
//!
//! let text = "Chr\trefseq\ttype\tref_allele\tvar_allele\tRS#\tLeftFlank\t\
//!             NA1-aff\tNA1-aff.score\tNA1-aff.cov\n\
//!             chr1\tBRCA1\tStop\tA\tG\t-\t100\tAG\t40\t30\n\
//!             chr1\tBRCA1\tSynonymous\tA\tG\t-\t200\tAG\t40\t30\n";
//! let store = TabularStore::parse(text, &VarSiftConfig::default()).unwrap();
//!
//! let mut filters = FilterConfig::default();
//! filters.variant_types.push(VariantType::Stop);
//! let outcome = apply_filters(&store, &filters).unwrap();
//! assert_eq!(outcome.mask.count(), 1);
//! ```

// --- Global Allocator: mimalloc ---
#[cfg(not(target_env = "msvc"))]
use mimalloc::MiMalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod config;
pub mod filter;
pub mod lineage;
pub mod mask;
pub mod pairing;
pub mod query;
pub mod regions;
pub mod schema;
pub mod session;
pub mod sidecar;
pub mod store;
pub mod value_index;

pub use config::{ColumnNames, HeaderMarkers, Sentinels, VarSiftConfig};
pub use filter::{
    apply_filters, ColumnBindings, FilterCategory, FilterConfig, FilterOutcome, VariantType,
};
pub use lineage::{StoreArena, StoreId};
pub use mask::InclusionMask;
pub use pairing::{pair_compound_het, pairing_header, PairingLayout};
pub use query::{CompiledQuery, QueryCompiler, QueryError};
pub use regions::{Region, RegionSet};
pub use schema::{AffectedNormalPair, ColumnCatalog, Role, SampleRoster, Schema};
pub use session::{FilteredView, Session};
pub use sidecar::{load_gene_set, load_rename_map};
pub use store::{Genotype, SampleDetail, TabularStore};
pub use value_index::{IndexValue, InternedColumn, ValueIndex};

use thiserror::Error;

/// Number of header/body tokens contributed by each sample
pub const SAMPLE_FIELDS: usize = 3;

/// Error types for varsift operations
#[derive(Error, Debug)]
pub enum VarSiftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input is not valid UTF-8")]
    InvalidUtf8,

    #[error("Input has no header line")]
    EmptyInput,

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Line {line}: expected {expected} columns (same as header), found {found}")]
    ColumnCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate annotation column: {0}")]
    DuplicateColumn(String),

    #[error("Affected/normal samples cannot be paired: {affected} affected, {normal} normal")]
    UnpairedSamples { affected: usize, normal: usize },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column {0} is not editable")]
    NotEditable(usize),

    #[error("Row {row} out of range ({count} visible rows)")]
    RowOutOfRange { row: usize, count: usize },

    #[error("Unknown store: {0}")]
    UnknownStore(usize),

    #[error("Unknown row key: {0}")]
    UnknownRowKey(String),

    #[error("Pairing needs at least one row key")]
    EmptyPairing,

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Query error: {0}")]
    Query(#[from] query::QueryError),

    #[error("Unknown index id: {0}")]
    UnknownIndexId(u32),

    #[error("Too many rows: {0}")]
    TooManyRows(usize),

    #[error("Region file line {line}: {reason}")]
    Region { line: usize, reason: String },

    #[error("Mask covers {found} rows, store has {expected}")]
    MaskLengthMismatch { expected: u32, found: u32 },
}

pub type Result<T> = std::result::Result<T, VarSiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = VarSiftError::ColumnCountMismatch {
            line: 3,
            expected: 10,
            found: 9,
        };
        assert_eq!(
            err.to_string(),
            "Line 3: expected 10 columns (same as header), found 9"
        );

        let err = VarSiftError::UnknownColumn("RS#".to_string());
        assert_eq!(err.to_string(), "Unknown column: RS#");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VarSiftError = io.into();
        assert!(matches!(err, VarSiftError::Io(_)));
    }
}
