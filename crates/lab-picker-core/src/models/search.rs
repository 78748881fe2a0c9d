//! Search and query models.

use serde::{Deserialize, Serialize};

use super::CatalogItem;

/// Raw and debounced search input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchState {
    /// What the user has typed so far
    pub raw_term: String,
    /// Last value that survived the debounce interval
    pub settled_term: String,
}

impl SearchState {
    /// True while the typed text has not settled yet.
    pub fn is_pending(&self) -> bool {
        self.raw_term != self.settled_term
    }
}

/// Filters applied to every catalog query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CatalogFilters {
    /// Restrict to one category
    pub category: Option<String>,
    /// Only return tests that are currently orderable
    pub active_only: bool,
    /// Maximum number of items per page
    pub page_size: u32,
}

impl Default for CatalogFilters {
    fn default() -> Self {
        Self {
            category: None,
            active_only: true,
            page_size: 50,
        }
    }
}

/// A single catalog lookup. Doubles as the cache key and the staleness key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    pub term: String,
    pub filters: CatalogFilters,
}

impl CatalogQuery {
    pub fn new(term: impl Into<String>, filters: CatalogFilters) -> Self {
        Self {
            term: term.into(),
            filters,
        }
    }

    /// Whether the query browses the catalog rather than searching it.
    pub fn is_browse(&self) -> bool {
        self.term.trim().is_empty()
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    /// Total matches on the server, across all pages
    #[serde(default)]
    pub total: u64,
}

impl CatalogPage {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let total = items.len() as u64;
        Self { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when the server holds more matches than this page shows.
    pub fn is_truncated(&self) -> bool {
        self.total > self.items.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_equality_covers_filters() {
        let a = CatalogQuery::new("cbc", CatalogFilters::default());
        let mut filters = CatalogFilters::default();
        filters.category = Some("hematology".into());
        let b = CatalogQuery::new("cbc", filters);

        assert_ne!(a, b);
        assert_eq!(a, CatalogQuery::new("cbc", CatalogFilters::default()));
    }

    #[test]
    fn test_browse_query() {
        assert!(CatalogQuery::new("  ", CatalogFilters::default()).is_browse());
        assert!(!CatalogQuery::new("lipid", CatalogFilters::default()).is_browse());
    }

    #[test]
    fn test_page_truncation() {
        let page: CatalogPage =
            serde_json::from_str(r#"{"items": [{"id": 1, "name": "CBC"}], "total": 12}"#).unwrap();
        assert!(page.is_truncated());
        assert!(!CatalogPage::new(page.items.clone()).is_truncated());
    }
}
