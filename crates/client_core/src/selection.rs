use std::collections::HashSet;

use shared::domain::ItemId;

use crate::catalog::Catalog;

/// Unique set of selected item identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    members: HashSet<ItemId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership and returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: &ItemId) -> bool {
        if self.members.remove(id.as_str()) {
            false
        } else {
            self.members.insert(id.clone());
            true
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Drops members missing from `catalog`, returning them in sorted order.
    pub fn retain_in(&mut self, catalog: &Catalog) -> Vec<ItemId> {
        let mut dropped: Vec<ItemId> = self
            .members
            .iter()
            .filter(|id| !catalog.contains(id.as_str()))
            .cloned()
            .collect();
        dropped.sort();
        for id in &dropped {
            self.members.remove(id.as_str());
        }
        dropped
    }

    /// Members in catalog order. Members unknown to `catalog` sort last.
    pub fn ordered(&self, catalog: &Catalog) -> Vec<ItemId> {
        let mut ordered: Vec<&ItemId> = self.members.iter().collect();
        ordered.sort_by(|left, right| {
            let left_key = (catalog.position(left.as_str()).unwrap_or(usize::MAX), *left);
            let right_key = (catalog.position(right.as_str()).unwrap_or(usize::MAX), *right);
            left_key.cmp(&right_key)
        });
        ordered.into_iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
