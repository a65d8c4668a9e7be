//! Store lineage
//!
//! Stores derived from other stores form a tree. The arena owns every
//! store; children record their parent's [`StoreId`].

use crate::store::TabularStore;
use crate::{Result, VarSiftError};
use std::fmt;

/// Index of a store inside a [`StoreArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub usize);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner of a root store and every subset derived from it
#[derive(Debug, Default)]
pub struct StoreArena {
    stores: Vec<TabularStore>,
}

impl StoreArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a store; its parent (if any) must already be in the arena
    pub fn insert(&mut self, store: TabularStore) -> Result<StoreId> {
        if let Some(parent) = store.parent() {
            self.get(parent)?;
        }
        self.stores.push(store);
        Ok(StoreId(self.stores.len() - 1))
    }

    pub fn get(&self, id: StoreId) -> Result<&TabularStore> {
        self.stores.get(id.0).ok_or(VarSiftError::UnknownStore(id.0))
    }

    pub fn get_mut(&mut self, id: StoreId) -> Result<&mut TabularStore> {
        self.stores
            .get_mut(id.0)
            .ok_or(VarSiftError::UnknownStore(id.0))
    }

    pub fn parent(&self, id: StoreId) -> Result<Option<StoreId>> {
        Ok(self.get(id)?.parent())
    }

    /// Path from `id` up to its root, starting with `id`
    pub fn ancestry(&self, id: StoreId) -> Result<Vec<StoreId>> {
        let mut path = vec![id];
        let mut current = self.get(id)?.parent();
        while let Some(p) = current {
            path.push(p);
            current = self.get(p)?.parent();
        }
        Ok(path)
    }

    pub fn children(&self, id: StoreId) -> Vec<StoreId> {
        self.stores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent() == Some(id))
            .map(|(i, _)| StoreId(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VarSiftConfig;
    use crate::mask::InclusionMask;

    fn root() -> TabularStore {
        TabularStore::parse("Chr\tPos\nchr1\t1\nchr1\t2\nchr2\t3\n", &VarSiftConfig::default())
            .unwrap()
    }

    #[test]
    fn test_tree_of_subsets() {
        let mut arena = StoreArena::new();
        let root_id = arena.insert(root()).unwrap();

        let child = arena
            .get(root_id)
            .unwrap()
            .subset(&InclusionMask::from_rows(3, [0, 1]), Some(root_id))
            .unwrap();
        let child_id = arena.insert(child).unwrap();

        let grandchild = arena
            .get(child_id)
            .unwrap()
            .subset(&InclusionMask::from_rows(2, [1]), Some(child_id))
            .unwrap();
        let grandchild_id = arena.insert(grandchild).unwrap();

        assert_eq!(arena.parent(root_id).unwrap(), None);
        assert_eq!(arena.parent(grandchild_id).unwrap(), Some(child_id));
        assert_eq!(
            arena.ancestry(grandchild_id).unwrap(),
            vec![grandchild_id, child_id, root_id]
        );
        assert_eq!(arena.children(root_id), vec![child_id]);
        assert_eq!(arena.get(grandchild_id).unwrap().value(0, 1), Some("2"));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut arena = StoreArena::new();
        let orphan = root()
            .subset(&InclusionMask::full(3), Some(StoreId(4)))
            .unwrap();
        assert!(matches!(
            arena.insert(orphan),
            Err(VarSiftError::UnknownStore(4))
        ));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_unknown_store() {
        let arena = StoreArena::new();
        assert!(arena.get(StoreId(0)).is_err());
    }
}
