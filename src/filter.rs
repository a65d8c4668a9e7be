//! Filter engine
//!
//! Turns a [`FilterConfig`] into one [`InclusionMask`] for a store:
//!
//! 1. **Plan**: every enabled category resolves its columns to offsets and
//!    loads its auxiliary files once. A missing column is an error for the
//!    whole query; an unreadable auxiliary file or a custom query that does
//!    not compile only skips that category.
//! 2. **Evaluate**: each planned category produces its own mask. Selected
//!    variant types are unioned into a single category mask.
//! 3. **Combine**: category masks and the gene-name pattern are intersected.
//!
//! Nothing is retained between calls; the same store and config always
//! give the same mask.

use crate::config::ColumnNames;
use crate::mask::InclusionMask;
use crate::query::{CompiledQuery, QueryCompiler};
use crate::regions::RegionSet;
use crate::schema::{AffectedNormalPair, ColumnCatalog};
use crate::sidecar::load_gene_set;
use crate::store::{Genotype, TabularStore};
use crate::Result;
use log::{info, warn};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Variant consequence labels found in the type column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantType {
    Stop,
    FrameshiftIndel,
    InframeIndel,
    SpliceSite,
    NonSynonymous,
    Synonymous,
    NonCoding,
    Utr,
}

impl VariantType {
    pub const ALL: [VariantType; 8] = [
        VariantType::Stop,
        VariantType::FrameshiftIndel,
        VariantType::InframeIndel,
        VariantType::SpliceSite,
        VariantType::NonSynonymous,
        VariantType::Synonymous,
        VariantType::NonCoding,
        VariantType::Utr,
    ];

    /// Value used in the type column
    pub fn label(&self) -> &'static str {
        match self {
            VariantType::Stop => "Stop",
            VariantType::FrameshiftIndel => "DIV-fs",
            VariantType::InframeIndel => "DIV-c",
            VariantType::SpliceSite => "Splice-site",
            VariantType::NonSynonymous => "Non-synonymous",
            VariantType::Synonymous => "Synonymous",
            VariantType::NonCoding => "NC",
            VariantType::Utr => "UTR",
        }
    }

    /// UTR matches any label containing "UTR" (5'UTR, 3'UTR); the rest match exactly
    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            VariantType::Utr => value.contains(self.label()),
            _ => value == self.label(),
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VariantType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(t) = VariantType::ALL.iter().find(|t| t.label() == s) {
            return Ok(*t);
        }
        match s.to_ascii_lowercase().as_str() {
            "stop" | "stop-gain" | "nonsense" => Ok(VariantType::Stop),
            "frameshift" | "fs" => Ok(VariantType::FrameshiftIndel),
            "inframe" | "indel" => Ok(VariantType::InframeIndel),
            "splice" | "splice-site" => Ok(VariantType::SpliceSite),
            "missense" | "non-synonymous" | "nonsynonymous" => Ok(VariantType::NonSynonymous),
            "synonymous" | "silent" => Ok(VariantType::Synonymous),
            "nc" | "non-coding" | "noncoding" => Ok(VariantType::NonCoding),
            "utr" => Ok(VariantType::Utr),
            _ => Err(format!("unknown variant type: {}", s)),
        }
    }
}

/// Filter categories intersected with each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterCategory {
    /// Known-variant id equals the "unknown" sentinel
    MissingKnownId,
    MendelianRecessive,
    MendelianDominant,
    MendelianInconsistent,
    /// Compound-het partner list is not empty
    CompoundHet,
    /// Enough affected/normal pairs with differing genotypes
    AffectedNormal,
    /// Variant seen in enough cases and few enough controls
    CaseControl,
    GeneListInclude,
    GeneListExclude,
    RegionInclude,
    CustomQuery,
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterCategory::MissingKnownId => "missing-known-id",
            FilterCategory::MendelianRecessive => "mendelian-recessive",
            FilterCategory::MendelianDominant => "mendelian-dominant",
            FilterCategory::MendelianInconsistent => "mendelian-inconsistent",
            FilterCategory::CompoundHet => "compound-het",
            FilterCategory::AffectedNormal => "affected-normal",
            FilterCategory::CaseControl => "case-control",
            FilterCategory::GeneListInclude => "gene-include",
            FilterCategory::GeneListExclude => "gene-exclude",
            FilterCategory::RegionInclude => "region-include",
            FilterCategory::CustomQuery => "custom-query",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const ALL: [FilterCategory; 11] = [
            FilterCategory::MissingKnownId,
            FilterCategory::MendelianRecessive,
            FilterCategory::MendelianDominant,
            FilterCategory::MendelianInconsistent,
            FilterCategory::CompoundHet,
            FilterCategory::AffectedNormal,
            FilterCategory::CaseControl,
            FilterCategory::GeneListInclude,
            FilterCategory::GeneListExclude,
            FilterCategory::RegionInclude,
            FilterCategory::CustomQuery,
        ];
        let wanted = s.to_ascii_lowercase();
        ALL.into_iter()
            .find(|c| c.to_string() == wanted)
            .ok_or_else(|| format!("unknown filter category: {}", s))
    }
}

/// One query's filter toggles and inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Selected variant types (union); empty means no type restriction
    pub variant_types: SmallVec<[VariantType; 8]>,
    pub categories: BTreeSet<FilterCategory>,
    pub gene_file: Option<PathBuf>,
    pub region_file: Option<PathBuf>,
    pub min_discordant_pairs: usize,
    pub min_case_matches: usize,
    pub max_control_matches: usize,
    /// Case-insensitive regex on the gene column, applied whenever set
    pub gene_pattern: Option<String>,
    pub custom_query: Option<String>,
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, variant_type: VariantType) -> Self {
        if !self.variant_types.contains(&variant_type) {
            self.variant_types.push(variant_type);
        }
        self
    }

    pub fn with_category(mut self, category: FilterCategory) -> Self {
        self.categories.insert(category);
        self
    }

    pub fn is_enabled(&self, category: FilterCategory) -> bool {
        self.categories.contains(&category)
    }
}

/// Result of one filter application
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub mask: InclusionMask,
    /// Categories that were evaluated and intersected
    pub applied: Vec<FilterCategory>,
    /// Categories dropped from this query, with the reason
    pub skipped: Vec<(FilterCategory, String)>,
}

/// Designated column offsets resolved once per query
#[derive(Debug, Clone)]
pub struct ColumnBindings<'a> {
    catalog: &'a ColumnCatalog,
    names: &'a ColumnNames,
}

impl<'a> ColumnBindings<'a> {
    pub fn new(catalog: &'a ColumnCatalog, names: &'a ColumnNames) -> Self {
        Self { catalog, names }
    }

    fn get(&self, name: &str) -> Result<usize> {
        self.catalog.require(name)
    }

    pub fn variant_type(&self) -> Result<usize> {
        self.get(&self.names.variant_type)
    }

    pub fn alleles(&self) -> Result<(usize, usize)> {
        Ok((self.get(&self.names.ref_allele)?, self.get(&self.names.var_allele)?))
    }

    pub fn known_id(&self) -> Result<usize> {
        self.get(&self.names.known_id)
    }

    pub fn mendelian(&self, category: FilterCategory) -> Result<usize> {
        match category {
            FilterCategory::MendelianRecessive => self.get(&self.names.mend_hom_rec),
            FilterCategory::MendelianDominant => self.get(&self.names.mend_dominant),
            FilterCategory::MendelianInconsistent => self.get(&self.names.mend_inconsistent),
            _ => self.compound_het(),
        }
    }

    /// Partner list column for compound heterozygotes
    pub fn compound_het(&self) -> Result<usize> {
        self.get(&self.names.mend_het_rec)
    }

    pub fn gene(&self) -> Result<usize> {
        self.get(&self.names.gene)
    }

    pub fn position(&self) -> Result<(usize, usize)> {
        Ok((self.get(&self.names.chrom)?, self.get(&self.names.left_flank)?))
    }
}

/// A category with everything it needs bound
enum Predicate {
    VariantTypes {
        column: usize,
        types: SmallVec<[VariantType; 8]>,
    },
    Equals {
        column: usize,
        value: String,
    },
    NotEquals {
        column: usize,
        value: String,
    },
    FlagSet {
        column: usize,
    },
    Discordant {
        pairs: Vec<AffectedNormalPair>,
        min_pairs: usize,
    },
    Segregating {
        ref_allele: usize,
        var_allele: usize,
        cases: Vec<usize>,
        controls: Vec<usize>,
        min_cases: usize,
        max_controls: usize,
    },
    GeneList {
        column: usize,
        genes: HashSet<String>,
        include: bool,
    },
    Regions {
        chrom: usize,
        left_flank: usize,
        regions: RegionSet,
    },
    Custom(CompiledQuery),
}

/// Evaluate `config` against `store`
pub fn apply_filters(store: &TabularStore, config: &FilterConfig) -> Result<FilterOutcome> {
    let bindings = ColumnBindings::new(store.catalog(), &store.config().columns);
    let mut planned: Vec<(FilterCategory, Predicate)> = Vec::new();
    let mut skipped = Vec::new();

    // Validate the pattern before doing any work
    let gene_pattern = match &config.gene_pattern {
        Some(p) => Some((
            bindings.gene()?,
            RegexBuilder::new(p).case_insensitive(true).build()?,
        )),
        None => None,
    };

    let type_filter = if config.variant_types.is_empty() {
        None
    } else {
        Some(Predicate::VariantTypes {
            column: bindings.variant_type()?,
            types: config.variant_types.clone(),
        })
    };

    let mut gene_set: Option<std::result::Result<HashSet<String>, String>> = None;

    for &category in &config.categories {
        let predicate = match category {
            FilterCategory::MissingKnownId => Predicate::Equals {
                column: bindings.known_id()?,
                value: store.config().sentinels.unknown_id.clone(),
            },
            FilterCategory::MendelianRecessive
            | FilterCategory::MendelianDominant
            | FilterCategory::MendelianInconsistent => Predicate::FlagSet {
                column: bindings.mendelian(category)?,
            },
            FilterCategory::CompoundHet => Predicate::NotEquals {
                column: bindings.compound_het()?,
                value: store.config().sentinels.empty_het_list.clone(),
            },
            FilterCategory::AffectedNormal => Predicate::Discordant {
                pairs: store.roster().pairs().to_vec(),
                min_pairs: config.min_discordant_pairs,
            },
            FilterCategory::CaseControl => {
                let (ref_allele, var_allele) = bindings.alleles()?;
                Predicate::Segregating {
                    ref_allele,
                    var_allele,
                    cases: store.roster().cases().to_vec(),
                    controls: store.roster().controls().to_vec(),
                    min_cases: config.min_case_matches,
                    max_controls: config.max_control_matches,
                }
            }
            FilterCategory::GeneListInclude | FilterCategory::GeneListExclude => {
                let column = bindings.gene()?;
                let loaded = gene_set.get_or_insert_with(|| match &config.gene_file {
                    Some(path) => load_gene_set(path)
                        .map_err(|e| format!("gene list {}: {}", path.display(), e)),
                    None => Err("no gene list file given".to_string()),
                });
                match loaded {
                    Ok(genes) => Predicate::GeneList {
                        column,
                        genes: genes.clone(),
                        include: category == FilterCategory::GeneListInclude,
                    },
                    Err(reason) => {
                        skipped.push((category, reason.clone()));
                        continue;
                    }
                }
            }
            FilterCategory::RegionInclude => {
                let (chrom, left_flank) = bindings.position()?;
                let loaded = match &config.region_file {
                    Some(path) => RegionSet::load(path)
                        .map_err(|e| format!("region file {}: {}", path.display(), e)),
                    None => Err("no region file given".to_string()),
                };
                match loaded {
                    Ok(regions) => Predicate::Regions {
                        chrom,
                        left_flank,
                        regions,
                    },
                    Err(reason) => {
                        skipped.push((category, reason));
                        continue;
                    }
                }
            }
            FilterCategory::CustomQuery => {
                let compiled = match config.custom_query.as_deref() {
                    Some(text) => QueryCompiler::new(store.catalog())
                        .compile(text)
                        .map_err(|e| format!("custom query not applied: {}", e)),
                    None => Err("no custom query set".to_string()),
                };
                match compiled {
                    Ok(query) => Predicate::Custom(query),
                    Err(reason) => {
                        skipped.push((category, reason));
                        continue;
                    }
                }
            }
        };
        planned.push((category, predicate));
    }

    for (category, reason) in &skipped {
        warn!("Skipping {} filter: {}", category, reason);
    }

    let min_depth = store.config().min_depth;
    let missing = store.config().sentinels.missing_genotype.as_str();
    let mut mask = store.full_mask();

    if let Some(predicate) = &type_filter {
        mask.intersect_with(&evaluate(store, predicate, min_depth, missing));
    }

    let mut applied = Vec::with_capacity(planned.len());
    for (category, predicate) in &planned {
        mask.intersect_with(&evaluate(store, predicate, min_depth, missing));
        applied.push(*category);
    }

    if let Some((column, regex)) = &gene_pattern {
        mask.intersect_with(&gene_pattern_mask(store, *column, regex));
    }

    info!(
        "Filtered {} of {} rows ({} categories, {} skipped)",
        mask.count(),
        store.row_count(),
        applied.len() + usize::from(type_filter.is_some()),
        skipped.len()
    );

    Ok(FilterOutcome {
        mask,
        applied,
        skipped,
    })
}

/// One mask per selected type, unioned
fn variant_type_mask(store: &TabularStore, column: usize, types: &[VariantType]) -> InclusionMask {
    let rows = store.rows();
    let mut mask = InclusionMask::empty(store.mask_len());
    for t in types {
        let one = InclusionMask::from_predicate(store.mask_len(), |r| t.matches(&rows[r][column]));
        mask.union_with(&one);
    }
    mask
}

fn gene_pattern_mask(store: &TabularStore, column: usize, regex: &Regex) -> InclusionMask {
    match store.gene_column() {
        Some(interned) if interned.column() == column => {
            InclusionMask::from_rows(store.mask_len(), interned.rows_matching(regex))
        }
        _ => {
            let rows = store.rows();
            InclusionMask::from_predicate(store.mask_len(), |r| regex.is_match(&rows[r][column]))
        }
    }
}

fn evaluate(
    store: &TabularStore,
    predicate: &Predicate,
    min_depth: u32,
    missing: &str,
) -> InclusionMask {
    let rows = store.rows();
    let len = store.mask_len();
    let samples = |r: usize| store.samples(r).unwrap_or(&[]);

    match predicate {
        Predicate::VariantTypes { column, types } => variant_type_mask(store, *column, types),
        Predicate::Equals { column, value } => {
            InclusionMask::from_predicate(len, |r| rows[r][*column] == *value)
        }
        Predicate::NotEquals { column, value } => {
            InclusionMask::from_predicate(len, |r| rows[r][*column] != *value)
        }
        Predicate::FlagSet { column } => {
            InclusionMask::from_predicate(len, |r| rows[r][*column].trim().parse::<i64>() == Ok(1))
        }
        Predicate::Discordant { pairs, min_pairs } => InclusionMask::from_predicate(len, |r| {
            discordant_pairs(samples(r), pairs, min_depth, missing) >= *min_pairs
        }),
        Predicate::Segregating {
            ref_allele,
            var_allele,
            cases,
            controls,
            min_cases,
            max_controls,
        } => InclusionMask::from_predicate(len, |r| {
            let row = &rows[r];
            let forms = NonRefGenotypes::new(&row[*ref_allele], &row[*var_allele]);
            let genotypes = samples(r);
            forms.count_carriers(genotypes, cases, min_depth) >= *min_cases
                && forms.count_carriers(genotypes, controls, min_depth) <= *max_controls
        }),
        Predicate::GeneList {
            column,
            genes,
            include,
        } => InclusionMask::from_predicate(len, |r| genes.contains(&rows[r][*column]) == *include),
        Predicate::Regions {
            chrom,
            left_flank,
            regions,
        } => InclusionMask::from_predicate(len, |r| {
            let row = &rows[r];
            match row[*left_flank].trim().parse::<u64>() {
                Ok(flank) => flank
                    .checked_add(1)
                    .is_some_and(|pos| regions.contains(&row[*chrom], pos)),
                Err(_) => false,
            }
        }),
        Predicate::Custom(query) => query.run(store),
    }
}

/// Pairs whose genotypes differ, are both called, and both meet `min_depth`
fn discordant_pairs(
    genotypes: &[Genotype],
    pairs: &[AffectedNormalPair],
    min_depth: u32,
    missing: &str,
) -> usize {
    pairs
        .iter()
        .filter(|p| {
            let (Some(aff), Some(norm)) = (genotypes.get(p.affected), genotypes.get(p.normal))
            else {
                return false;
            };
            aff.call != norm.call
                && aff.call != missing
                && norm.call != missing
                && aff.meets_depth(min_depth)
                && norm.meets_depth(min_depth)
        })
        .count()
}

/// Heterozygous and homozygous non-reference genotype strings for a site
struct NonRefGenotypes {
    het: String,
    hom: String,
}

impl NonRefGenotypes {
    fn new(ref_allele: &str, var_allele: &str) -> Self {
        let mut alleles = [ref_allele, var_allele];
        alleles.sort_unstable();
        Self {
            het: alleles.concat(),
            hom: [var_allele, var_allele].concat(),
        }
    }

    /// Genotypes are compared with `:` separators removed
    fn is_carrier(&self, call: &str) -> bool {
        if call.contains(':') {
            let joined: String = call.split(':').collect();
            joined == self.het || joined == self.hom
        } else {
            call == self.het || call == self.hom
        }
    }

    fn count_carriers(&self, genotypes: &[Genotype], members: &[usize], min_depth: u32) -> usize {
        members
            .iter()
            .filter_map(|&i| genotypes.get(i))
            .filter(|g| self.is_carrier(&g.call) && g.meets_depth(min_depth))
            .count()
    }
}
