//! Identity-preserving merge of fetched catalog items and association stubs.
//!
//! The picker shows tests that are already linked to the parent record even
//! when they are not on the current search page. Fetched records always win
//! over stubs for the same identifier; a stub only fills the gap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{AssociationStub, CatalogItem, TestId};

/// Display name template for stubs that arrive without a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackLabel {
    template: String,
}

impl FallbackLabel {
    pub const PLACEHOLDER: &'static str = "{id}";
    pub const DEFAULT_TEMPLATE: &'static str = "Test #{id}";

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, id: TestId) -> String {
        self.template.replace(Self::PLACEHOLDER, &id.to_string())
    }
}

impl Default for FallbackLabel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEMPLATE)
    }
}

/// Where a merged record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOrigin {
    Fetched,
    Stub,
}

/// Lookup table from identifier to one display record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedIndex {
    records: HashMap<TestId, (CatalogItem, RecordOrigin)>,
}

impl MergedIndex {
    pub fn get(&self, id: TestId) -> Option<&CatalogItem> {
        self.records.get(&id).map(|(item, _)| item)
    }

    pub fn origin(&self, id: TestId) -> Option<RecordOrigin> {
        self.records.get(&id).map(|(_, origin)| *origin)
    }

    pub fn contains(&self, id: TestId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TestId> + '_ {
        self.records.keys().copied()
    }

    /// Every record, re-expressed as a stub. Sorted by identifier.
    pub fn to_stubs(&self) -> Vec<AssociationStub> {
        let mut stubs: Vec<AssociationStub> = self
            .records
            .values()
            .map(|(item, _)| AssociationStub::from(item))
            .collect();
        stubs.sort_by_key(|stub| stub.effective_id());
        stubs
    }

    /// Resolve `ids` in order, silently skipping identifiers with no record.
    pub fn resolve<'a>(&'a self, ids: &'a [TestId]) -> impl Iterator<Item = &'a CatalogItem> + 'a {
        ids.iter().filter_map(move |id| self.get(*id))
    }
}

/// Build a display record for a stub, filling gaps with fallbacks.
pub fn synthesize(id: TestId, stub: &AssociationStub, label: &FallbackLabel) -> CatalogItem {
    CatalogItem {
        id,
        name: stub
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| label.render(id)),
        code: stub.code.clone().unwrap_or_default(),
        price: stub.price.unwrap_or(0.0),
        category: None,
    }
}

/// Merge the fetched page with the caller's stubs.
///
/// Pure: neither input is modified, and the same inputs always produce the
/// same index. Stubs without any identifier are skipped.
pub fn merge(page: &[CatalogItem], stubs: &[AssociationStub], label: &FallbackLabel) -> MergedIndex {
    let mut records = HashMap::with_capacity(page.len() + stubs.len());

    for item in page {
        records.insert(item.id, (item.clone(), RecordOrigin::Fetched));
    }

    for stub in stubs {
        let Some(id) = stub.effective_id() else {
            continue;
        };
        records
            .entry(id)
            .or_insert_with(|| (synthesize(id, stub, label), RecordOrigin::Stub));
    }

    MergedIndex { records }
}
