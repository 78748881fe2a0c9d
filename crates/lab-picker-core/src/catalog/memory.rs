//! In-memory catalog for tests and offline demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CatalogError, CatalogResult, CatalogSource};
use crate::models::{CatalogItem, CatalogPage, CatalogQuery};

/// Catalog backed by a fixed list of items.
///
/// Matching mirrors the server: case-insensitive substring on name or code,
/// optional category filter, truncated to the page size.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
    /// Per-term artificial latency
    latency: HashMap<String, Duration>,
    /// Failures to return before answering normally again
    failures: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Delay answers for `term` by `delay`.
    pub fn with_latency(mut self, term: impl Into<String>, delay: Duration) -> Self {
        self.latency.insert(term.into(), delay);
        self
    }

    /// Make the next fetch fail with `RemoteUnavailable`.
    pub fn fail_next(&self, message: impl Into<String>) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(message.into());
        }
    }

    /// Number of fetches served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Answer a query synchronously.
    pub fn search(&self, query: &CatalogQuery) -> CatalogPage {
        let needle = query.term.trim().to_lowercase();
        let matches: Vec<&CatalogItem> = self
            .items
            .iter()
            .filter(|item| match &query.filters.category {
                Some(category) => item.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .filter(|item| {
                needle.is_empty()
                    || item.name.to_lowercase().contains(&needle)
                    || item.code.to_lowercase().contains(&needle)
            })
            .collect();

        CatalogPage {
            total: matches.len() as u64,
            items: matches
                .into_iter()
                .take(query.filters.page_size as usize)
                .cloned()
                .collect(),
        }
    }

    fn next_failure(&self) -> Option<String> {
        self.failures.lock().ok().and_then(|mut f| f.pop_front())
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch(&self, query: &CatalogQuery) -> CatalogResult<CatalogPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.latency.get(&query.term) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(message) = self.next_failure() {
            return Err(CatalogError::RemoteUnavailable(message));
        }
        Ok(self.search(query))
    }
}
