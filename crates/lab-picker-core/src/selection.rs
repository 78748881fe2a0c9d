//! Ordered, duplicate-free selection of lab tests.
//!
//! The parent form owns the selection. Every operation here returns a new set
//! and leaves the receiver alone, so the parent can compare old and new values.

use serde::{Deserialize, Serialize};

use crate::models::TestId;

/// Selected identifiers in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<TestId>", into = "Vec<TestId>")]
pub struct SelectionSet {
    ids: Vec<TestId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a caller-supplied list, keeping the first of any duplicates.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TestId>,
    {
        let mut unique = Vec::new();
        for id in ids {
            let id = id.into();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { ids: unique }
    }

    pub fn contains(&self, id: TestId) -> bool {
        self.ids.contains(&id)
    }

    /// Append `id` unless already selected.
    pub fn add(&self, id: TestId) -> Self {
        if self.contains(id) {
            return self.clone();
        }
        let mut ids = self.ids.clone();
        ids.push(id);
        Self { ids }
    }

    /// Drop `id` if selected.
    pub fn remove(&self, id: TestId) -> Self {
        Self {
            ids: self.ids.iter().copied().filter(|x| *x != id).collect(),
        }
    }

    pub fn toggle(&self, id: TestId) -> Self {
        if self.contains(id) {
            self.remove(id)
        } else {
            self.add(id)
        }
    }

    pub fn ids(&self) -> &[TestId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_vec(&self) -> Vec<TestId> {
        self.ids.clone()
    }
}

impl From<Vec<TestId>> for SelectionSet {
    fn from(ids: Vec<TestId>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<SelectionSet> for Vec<TestId> {
    fn from(set: SelectionSet) -> Self {
        set.ids
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a TestId;
    type IntoIter = std::slice::Iter<'a, TestId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
