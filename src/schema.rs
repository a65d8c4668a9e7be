//! Header resolution
//!
//! The header line is split into annotation columns (everything before the
//! first sample-marked token) and sample groups of [`SAMPLE_FIELDS`] tokens.
//! The first token of each group is the sample name; substring markers in
//! that name decide the sample's role.
//!
//! ```text
//! Chr  refseq  type ... │ NA01-aff  NA01-aff.q  NA01-aff.d │ NA01-norm ...
//! └──── ColumnCatalog ──┘ └──────── sample 0 ─────────────┘ └─ sample 1
//! ```

use crate::config::HeaderMarkers;
use crate::{Result, VarSiftError, SAMPLE_FIELDS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Annotation column names, offsets and edit permissions
#[derive(Debug, Clone)]
pub struct ColumnCatalog {
    names: Vec<String>,
    offsets: HashMap<String, usize>,
    editable: Vec<bool>,
}

impl ColumnCatalog {
    pub fn new(names: Vec<String>, editable_marker: &str) -> Result<Self> {
        let mut offsets = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if offsets.insert(name.clone(), i).is_some() {
                return Err(VarSiftError::DuplicateColumn(name.clone()));
            }
        }
        let editable = names
            .iter()
            .map(|n| !editable_marker.is_empty() && n.contains(editable_marker))
            .collect();
        Ok(Self {
            names,
            offsets,
            editable,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, column: usize) -> Option<&str> {
        self.names.get(column).map(|s| s.as_str())
    }

    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// Like [`offset`](Self::offset) but a missing column is an error
    pub fn require(&self, name: &str) -> Result<usize> {
        self.offset(name)
            .ok_or_else(|| VarSiftError::UnknownColumn(name.to_string()))
    }

    pub fn is_editable(&self, column: usize) -> bool {
        self.editable.get(column).copied().unwrap_or(false)
    }

    pub fn editable_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.editable
            .iter()
            .enumerate()
            .filter(|(_, &e)| e)
            .map(|(i, _)| i)
    }
}

/// Sample roles derived from header markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    AffectedNormalPair,
    Case,
    Control,
}

/// Roster positions of one affected sample and its matched normal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffectedNormalPair {
    pub affected: usize,
    pub normal: usize,
}

/// Sample display names and role classification
#[derive(Debug, Clone, Default)]
pub struct SampleRoster {
    names: Vec<String>,
    header_tokens: Vec<String>,
    pairs: Vec<AffectedNormalPair>,
    cases: Vec<usize>,
    controls: Vec<usize>,
}

impl SampleRoster {
    /// Classify sample groups; `tokens.len()` must be a multiple of [`SAMPLE_FIELDS`]
    pub fn from_tokens(tokens: &[&str], markers: &HeaderMarkers) -> Result<Self> {
        if tokens.len() % SAMPLE_FIELDS != 0 {
            return Err(VarSiftError::MalformedHeader(format!(
                "{} sample columns is not a multiple of {}",
                tokens.len(),
                SAMPLE_FIELDS
            )));
        }

        let mut names = Vec::with_capacity(tokens.len() / SAMPLE_FIELDS);
        let mut affected = Vec::new();
        let mut normal = Vec::new();
        let mut cases = Vec::new();
        let mut controls = Vec::new();

        for (pos, group) in tokens.chunks(SAMPLE_FIELDS).enumerate() {
            let name = group[0];
            if has_marker(name, &markers.affected) {
                affected.push(pos);
            } else if has_marker(name, &markers.normal) {
                normal.push(pos);
            }
            if has_marker(name, &markers.case) {
                cases.push(pos);
            } else if has_marker(name, &markers.control) {
                controls.push(pos);
            }
            names.push(name.to_string());
        }

        let pairs = pair_samples(&affected, &normal)?;

        Ok(Self {
            names,
            header_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            pairs,
            cases,
            controls,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display names (after renaming)
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Sample header tokens exactly as read, all fields per sample
    pub fn header_tokens(&self) -> &[String] {
        &self.header_tokens
    }

    pub fn pairs(&self) -> &[AffectedNormalPair] {
        &self.pairs
    }

    pub fn cases(&self) -> &[usize] {
        &self.cases
    }

    pub fn controls(&self) -> &[usize] {
        &self.controls
    }

    pub fn count_role(&self, role: Role) -> usize {
        match role {
            Role::AffectedNormalPair => self.pairs.len(),
            Role::Case => self.cases.len(),
            Role::Control => self.controls.len(),
        }
    }

    /// Replace display names found in `renames`; roles are unaffected
    pub fn apply_renames(&mut self, renames: &HashMap<String, String>) {
        for name in &mut self.names {
            if let Some(new_name) = renames.get(name.as_str()) {
                *name = new_name.clone();
            }
        }
    }
}

#[inline]
fn has_marker(token: &str, marker: &str) -> bool {
    !marker.is_empty() && token.contains(marker)
}

/// i-th affected pairs with i-th normal; a count mismatch is an error
fn pair_samples(affected: &[usize], normal: &[usize]) -> Result<Vec<AffectedNormalPair>> {
    if affected.is_empty() || normal.is_empty() {
        return Ok(Vec::new());
    }
    if affected.len() != normal.len() {
        return Err(VarSiftError::UnpairedSamples {
            affected: affected.len(),
            normal: normal.len(),
        });
    }
    Ok(affected
        .iter()
        .zip(normal)
        .map(|(&affected, &normal)| AffectedNormalPair { affected, normal })
        .collect())
}

/// Column catalog plus sample roster, shared by a store and its subsets
#[derive(Debug, Clone)]
pub struct Schema {
    pub catalog: ColumnCatalog,
    pub roster: SampleRoster,
}

impl Schema {
    pub fn from_header(tokens: &[&str], markers: &HeaderMarkers) -> Result<Self> {
        let split = tokens
            .iter()
            .position(|t| has_marker(t, &markers.sample))
            .unwrap_or(tokens.len());

        let annotation: Vec<String> = tokens[..split].iter().map(|t| t.to_string()).collect();
        let catalog = ColumnCatalog::new(annotation, &markers.editable)?;
        let roster = SampleRoster::from_tokens(&tokens[split..], markers)?;

        Ok(Self { catalog, roster })
    }

    /// Tokens per line: annotation columns plus every sample field
    pub fn width(&self) -> usize {
        self.catalog.len() + self.roster.len() * SAMPLE_FIELDS
    }

    /// Header line tokens exactly as read
    pub fn header(&self) -> Vec<&str> {
        self.catalog
            .names()
            .iter()
            .chain(self.roster.header_tokens())
            .map(|s| s.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(line: &str) -> Vec<&str> {
        line.split('\t').collect()
    }

    #[test]
    fn test_annotation_and_samples_split() {
        let tokens = header(
            "Chr\trefseq\tComments\tNA01-aff\tNA01-aff.q\tNA01-aff.d\tNA01-norm\tNA01-norm.q\tNA01-norm.d",
        );
        let schema = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap();

        assert_eq!(schema.catalog.names(), &["Chr", "refseq", "Comments"]);
        assert_eq!(schema.catalog.offset("refseq"), Some(1));
        assert!(schema.catalog.is_editable(2));
        assert!(!schema.catalog.is_editable(0));
        assert_eq!(schema.roster.names(), &["NA01-aff", "NA01-norm"]);
        assert_eq!(
            schema.roster.pairs(),
            &[AffectedNormalPair {
                affected: 0,
                normal: 1
            }]
        );
        assert_eq!(schema.width(), tokens.len());
        assert_eq!(schema.header(), tokens);
    }

    #[test]
    fn test_positional_pairing() {
        let tokens = header(
            "Chr\tNA1-aff\tq\td\tNA2-aff\tq\td\tNA1-norm\tq\td\tNA2-norm\tq\td",
        );
        let schema = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap();
        let pairs = schema.roster.pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], AffectedNormalPair { affected: 0, normal: 2 });
        assert_eq!(pairs[1], AffectedNormalPair { affected: 1, normal: 3 });
    }

    #[test]
    fn test_unpaired_samples_rejected() {
        let tokens = header("Chr\tNA1-aff\tq\td\tNA2-aff\tq\td\tNA1-norm\tq\td");
        let err = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap_err();
        assert!(matches!(
            err,
            VarSiftError::UnpairedSamples {
                affected: 2,
                normal: 1
            }
        ));
    }

    #[test]
    fn test_affected_without_normals_has_no_pairs() {
        let tokens = header("Chr\tNA1-aff\tq\td\tNA2-aff\tq\td");
        let schema = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap();
        assert!(schema.roster.pairs().is_empty());
        assert_eq!(schema.roster.count_role(Role::AffectedNormalPair), 0);
    }

    #[test]
    fn test_case_control_roles() {
        let tokens = header(
            "Chr\tNA1-case\tq\td\tNA2-control\tq\td\tNA3-case\tq\td\tNA4\tq\td",
        );
        let schema = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap();
        assert_eq!(schema.roster.cases(), &[0, 2]);
        assert_eq!(schema.roster.controls(), &[1]);
        assert_eq!(schema.roster.count_role(Role::Case), 2);
        assert_eq!(schema.roster.count_role(Role::Control), 1);
    }

    #[test]
    fn test_incomplete_sample_group() {
        let tokens = header("Chr\tNA1-aff\tNA1-norm");
        let err = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap_err();
        assert!(matches!(err, VarSiftError::MalformedHeader(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let tokens = header("Chr\tChr");
        let err = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap_err();
        assert!(matches!(err, VarSiftError::DuplicateColumn(name) if name == "Chr"));
    }

    #[test]
    fn test_require_unknown_column() {
        let catalog = ColumnCatalog::new(vec!["Chr".to_string()], "Comments").unwrap();
        assert_eq!(catalog.require("Chr").unwrap(), 0);
        assert!(matches!(
            catalog.require("type"),
            Err(VarSiftError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_renames_keep_roles() {
        let tokens = header("Chr\tNA1-case\tq\td\tNA2\tq\td");
        let mut schema = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap();
        let renames = HashMap::from([("NA1-case".to_string(), "Proband".to_string())]);
        schema.roster.apply_renames(&renames);

        assert_eq!(schema.roster.names(), &["Proband", "NA2"]);
        assert_eq!(schema.roster.cases(), &[0]);
        // original header is untouched
        assert_eq!(schema.roster.header_tokens()[0], "NA1-case");
    }

    #[test]
    fn test_no_samples() {
        let tokens = header("Chr\trefseq\ttype");
        let schema = Schema::from_header(&tokens, &HeaderMarkers::default()).unwrap();
        assert!(schema.roster.is_empty());
        assert_eq!(schema.catalog.len(), 3);
    }
}
