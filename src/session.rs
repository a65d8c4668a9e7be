//! Interactive session over a store tree
//!
//! A [`Session`] owns a [`StoreArena`] and, per store, the mask of the last
//! filter application and an optional custom query. Row positions passed in
//! and out are *visible* positions: the n-th row included by that store's
//! current mask.

use crate::config::VarSiftConfig;
use crate::filter::{apply_filters, FilterCategory, FilterConfig};
use crate::lineage::{StoreArena, StoreId};
use crate::mask::InclusionMask;
use crate::pairing::{pair_compound_het, pairing_header};
use crate::schema::Role;
use crate::store::{SampleDetail, TabularStore};
use crate::{Result, VarSiftError};
use serde::Serialize;
use std::path::Path;

/// Header plus rows, ready for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilteredView {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl FilteredView {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug)]
struct StoreState {
    mask: InclusionMask,
    custom_query: Option<String>,
}

impl StoreState {
    fn new(store: &TabularStore) -> Self {
        Self {
            mask: store.full_mask(),
            custom_query: None,
        }
    }
}

/// Stores, their current masks and custom queries
#[derive(Debug)]
pub struct Session {
    arena: StoreArena,
    states: Vec<StoreState>,
}

impl Session {
    /// Load the root store from a file
    pub fn open<P: AsRef<Path>>(path: P, config: &VarSiftConfig) -> Result<Self> {
        Self::from_store(TabularStore::open(path, config)?)
    }

    pub fn from_store(store: TabularStore) -> Result<Self> {
        let mut session = Self {
            arena: StoreArena::new(),
            states: Vec::new(),
        };
        session.insert(store)?;
        Ok(session)
    }

    /// The store the session was created from
    pub fn root(&self) -> StoreId {
        StoreId(0)
    }

    fn insert(&mut self, store: TabularStore) -> Result<StoreId> {
        let state = StoreState::new(&store);
        let id = self.arena.insert(store)?;
        self.states.push(state);
        Ok(id)
    }

    fn state(&self, id: StoreId) -> Result<&StoreState> {
        self.states.get(id.0).ok_or(VarSiftError::UnknownStore(id.0))
    }

    fn state_mut(&mut self, id: StoreId) -> Result<&mut StoreState> {
        self.states
            .get_mut(id.0)
            .ok_or(VarSiftError::UnknownStore(id.0))
    }

    pub fn store(&self, id: StoreId) -> Result<&TabularStore> {
        self.arena.get(id)
    }

    pub fn arena(&self) -> &StoreArena {
        &self.arena
    }

    pub fn mask(&self, id: StoreId) -> Result<&InclusionMask> {
        Ok(&self.state(id)?.mask)
    }

    pub fn visible_count(&self, id: StoreId) -> Result<usize> {
        Ok(self.state(id)?.mask.count())
    }

    /// Evaluate `config` and make the result the store's current mask.
    ///
    /// When the custom-query category is enabled without query text, the
    /// query stored with [`set_custom_query`](Self::set_custom_query) is used.
    pub fn apply_filters(&mut self, id: StoreId, config: &FilterConfig) -> Result<usize> {
        let state = self.state(id)?;
        let stored;
        let config = if config.is_enabled(FilterCategory::CustomQuery)
            && config.custom_query.is_none()
            && state.custom_query.is_some()
        {
            let mut with_query = config.clone();
            with_query.custom_query = state.custom_query.clone();
            stored = with_query;
            &stored
        } else {
            config
        };

        let outcome = apply_filters(self.arena.get(id)?, config)?;
        let count = outcome.mask.count();
        self.state_mut(id)?.mask = outcome.mask;
        Ok(count)
    }

    /// Include every row again
    pub fn reset_filters(&mut self, id: StoreId) -> Result<()> {
        let full = self.arena.get(id)?.full_mask();
        self.state_mut(id)?.mask = full;
        Ok(())
    }

    pub fn set_custom_query(&mut self, id: StoreId, query: &str) -> Result<()> {
        let query = query.trim();
        self.state_mut(id)?.custom_query = if query.is_empty() {
            None
        } else {
            Some(query.to_string())
        };
        Ok(())
    }

    pub fn custom_query(&self, id: StoreId) -> Result<Option<&str>> {
        Ok(self.state(id)?.custom_query.as_deref())
    }

    /// Annotation header and the rows included by the current mask
    pub fn filtered_rows(&self, id: StoreId) -> Result<FilteredView> {
        let store = self.arena.get(id)?;
        let mask = &self.state(id)?.mask;
        let rows = mask
            .iter()
            .filter_map(|r| store.row(r).map(|fields| fields.to_vec()))
            .collect();
        Ok(FilteredView {
            header: store.catalog().names().to_vec(),
            rows,
        })
    }

    fn storage_row(&self, id: StoreId, visible_row: usize) -> Result<usize> {
        let mask = &self.state(id)?.mask;
        mask.nth_included(visible_row)
            .ok_or(VarSiftError::RowOutOfRange {
                row: visible_row,
                count: mask.count(),
            })
    }

    /// Per-sample genotype fields of one visible row; empty when nothing is visible
    pub fn sample_detail(&self, id: StoreId, visible_row: usize) -> Result<Vec<SampleDetail>> {
        if self.visible_count(id)? == 0 {
            return Ok(Vec::new());
        }
        let row = self.storage_row(id, visible_row)?;
        Ok(self.arena.get(id)?.sample_detail(row))
    }

    /// Annotation value at a visible row, `None` for unknown columns or rows
    pub fn value_at(&self, id: StoreId, visible_row: usize, column: &str) -> Option<&str> {
        let store = self.arena.get(id).ok()?;
        let col = store.catalog().offset(column)?;
        let row = self.storage_row(id, visible_row).ok()?;
        store.value(row, col)
    }

    /// Overwrite an editable annotation cell of a visible row
    pub fn edit_cell(
        &mut self,
        id: StoreId,
        visible_row: usize,
        column: &str,
        value: &str,
    ) -> Result<()> {
        let state = self.states.get(id.0).ok_or(VarSiftError::UnknownStore(id.0))?;
        let store = self.arena.get_mut(id)?;
        let col = store.catalog().require(column)?;
        store.set_cell(&state.mask, visible_row, col, value)
    }

    /// Derive a child store holding the rows of `mask` (default: the current mask)
    pub fn subset(&mut self, id: StoreId, mask: Option<&InclusionMask>) -> Result<StoreId> {
        let current = &self.state(id)?.mask;
        let child = self.arena.get(id)?.subset(mask.unwrap_or(current), Some(id))?;
        self.insert(child)
    }

    pub fn parent(&self, id: StoreId) -> Result<Option<StoreId>> {
        self.arena.parent(id)
    }

    pub fn count_role(&self, id: StoreId, role: Role) -> Result<usize> {
        Ok(self.arena.get(id)?.roster().count_role(role))
    }

    /// Visible-row counts per gene, sorted by gene name
    pub fn gene_summary(&self, id: StoreId) -> Result<FilteredView> {
        let store = self.arena.get(id)?;
        let counts = store.gene_counts(&self.state(id)?.mask)?;
        Ok(FilteredView {
            header: vec![store.config().columns.gene.clone(), "Var Count".to_string()],
            rows: counts
                .into_iter()
                .map(|(gene, n)| vec![gene, n.to_string()])
                .collect(),
        })
    }

    /// Compound-het records over the whole store, ignoring its mask
    pub fn pairing<S: AsRef<str>>(
        &self,
        id: StoreId,
        keys: &[S],
        include_samples: bool,
    ) -> Result<FilteredView> {
        let store = self.arena.get(id)?;
        Ok(FilteredView {
            header: pairing_header(store, include_samples)?,
            rows: pair_compound_het(store, keys, include_samples)?,
        })
    }
}
