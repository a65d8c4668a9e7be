//! Load-time configuration
//!
//! Header markers, designated column names and sentinel values are fixed
//! by convention in variant tables but differ between pipelines, so they
//! live in one serde-backed structure that can be overridden from JSON.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Substrings used to classify header tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderMarkers {
    /// Marks a token as belonging to a sample group
    pub sample: String,
    /// Marks a sample as the affected side of a pair
    pub affected: String,
    /// Marks a sample as the normal side of a pair
    pub normal: String,
    pub case: String,
    pub control: String,
    /// Marks an annotation column as user-editable
    pub editable: String,
}

impl Default for HeaderMarkers {
    fn default() -> Self {
        Self {
            sample: "NA".to_string(),
            affected: "aff".to_string(),
            normal: "norm".to_string(),
            case: "case".to_string(),
            control: "control".to_string(),
            editable: "Comments".to_string(),
        }
    }
}

/// Names of the annotation columns filters and pairing read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub variant_type: String,
    pub ref_allele: String,
    pub var_allele: String,
    pub known_id: String,
    pub mend_hom_rec: String,
    pub mend_dominant: String,
    pub mend_inconsistent: String,
    pub mend_het_rec: String,
    pub gene: String,
    pub chrom: String,
    pub left_flank: String,
    pub row_key: String,
    pub score: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            variant_type: "type".to_string(),
            ref_allele: "ref_allele".to_string(),
            var_allele: "var_allele".to_string(),
            known_id: "RS#".to_string(),
            mend_hom_rec: "MendHomRec".to_string(),
            mend_dominant: "MendDom".to_string(),
            mend_inconsistent: "MendInconsis".to_string(),
            mend_het_rec: "MendHetRec".to_string(),
            gene: "refseq".to_string(),
            chrom: "Chr".to_string(),
            left_flank: "LeftFlank".to_string(),
            row_key: "Index".to_string(),
            score: "CDPred_score".to_string(),
        }
    }
}

/// Placeholder values with special meaning in the table body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    /// Genotype value for a missing call
    pub missing_genotype: String,
    /// Known-variant id value meaning "not in the database"
    pub unknown_id: String,
    /// Compound-het list value meaning "no partners"
    pub empty_het_list: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            missing_genotype: "NA".to_string(),
            unknown_id: "-".to_string(),
            empty_het_list: "0,".to_string(),
        }
    }
}

/// Complete load and filter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarSiftConfig {
    pub markers: HeaderMarkers,
    pub columns: ColumnNames,
    pub sentinels: Sentinels,
    /// Minimum read depth for a genotype to count in sample filters
    pub min_depth: u32,
    /// Appended to the input path to locate the sample rename file
    pub rename_suffix: String,
}

impl Default for VarSiftConfig {
    fn default() -> Self {
        Self {
            markers: HeaderMarkers::default(),
            columns: ColumnNames::default(),
            sentinels: Sentinels::default(),
            min_depth: 10,
            rename_suffix: ".map".to_string(),
        }
    }
}

impl VarSiftConfig {
    /// Parse a JSON override; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VarSiftConfig::default();
        assert_eq!(config.min_depth, 10);
        assert_eq!(config.markers.sample, "NA");
        assert_eq!(config.columns.known_id, "RS#");
        assert_eq!(config.sentinels.empty_het_list, "0,");
    }

    #[test]
    fn test_partial_json_override() {
        let config =
            VarSiftConfig::from_json(r#"{"min_depth": 20, "markers": {"sample": "S_"}}"#).unwrap();
        assert_eq!(config.min_depth, 20);
        assert_eq!(config.markers.sample, "S_");
        // untouched keys keep defaults
        assert_eq!(config.markers.affected, "aff");
        assert_eq!(config.columns.gene, "refseq");
    }

    #[test]
    fn test_invalid_json() {
        assert!(VarSiftConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("varsift.json");
        fs::write(&path, r#"{"rename_suffix": ".names"}"#).unwrap();

        let config = VarSiftConfig::from_json_file(&path).unwrap();
        assert_eq!(config.rename_suffix, ".names");
    }
}
