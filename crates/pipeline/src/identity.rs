//! Bidirectional mapping between raw identifiers and dense indices.
//!
//! Indices are assigned in ascending order of the raw identifier starting at
//! [`INDEX_BASE`], so the same set of identifiers always produces the same
//! mapping regardless of the order they were observed in.

use std::collections::{BTreeSet, HashMap};

/// Dense index of a user
pub type UserIndex = u32;

/// Dense index of an item
pub type ItemIndex = u32;

/// First index handed out by [`IdentityRegistry::assign`]
pub const INDEX_BASE: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    forward: HashMap<String, u32>,
    /// `reverse[i]` is the raw id of index `i + INDEX_BASE`
    reverse: Vec<String>,
}

impl IdentityRegistry {
    /// Assign indices to the distinct identifiers in `raw_ids`
    ///
    /// Duplicates are ignored. An empty input gives an empty registry.
    pub fn assign<I, S>(raw_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = raw_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();

        let reverse: Vec<String> = sorted.into_iter().collect();
        let forward = reverse
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), INDEX_BASE + pos as u32))
            .collect();

        Self { forward, reverse }
    }

    pub fn index_of(&self, raw_id: &str) -> Option<u32> {
        self.forward.get(raw_id).copied()
    }

    pub fn raw_id(&self, index: u32) -> Option<&str> {
        let pos = index.checked_sub(INDEX_BASE)? as usize;
        self.reverse.get(pos).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// (index, raw id) pairs in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.reverse
            .iter()
            .enumerate()
            .map(|(pos, id)| (INDEX_BASE + pos as u32, id.as_str()))
    }
}
