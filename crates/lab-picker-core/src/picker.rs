//! Picker view model.
//!
//! A synchronous state machine with an explicit clock. It decides *when* a
//! catalog query is needed and what to show; it never performs I/O. Drivers
//! ([`crate::session`] or a host through the FFI object) run the returned
//! queries and report results back through [`PickerViewModel::apply_response`].
//!
//! ```text
//!   Idle ──activate──▶ Loading ──page──▶ Loaded ◀──┐
//!                         │                │       │ cache hit
//!                         └──failure──▶ Error      │
//!                                          │       │
//!   Loaded / Error ──input──▶ Searching ──settle──┴──▶ Loading
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{CatalogResult, QueryCache};
use crate::config::PickerConfig;
use crate::debounce::Debouncer;
use crate::merge::{merge, FallbackLabel, MergedIndex};
use crate::models::{
    AssociationStub, CatalogFilters, CatalogItem, CatalogPage, CatalogQuery, SearchState, TestId,
};
use crate::selection::SelectionSet;

/// Where the picker is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickerPhase {
    /// Nothing queried yet
    Idle,
    /// Typed text waiting for the debounce interval
    Searching,
    /// Query sent, no answer for the current key yet
    Loading,
    /// A page for the current key is shown
    Loaded,
    /// The last fetch for the current key failed
    Error,
}

/// Receives every change to the selection. The parent form persists it.
pub trait SelectionListener: Send {
    fn selection_changed(&mut self, selection: &SelectionSet);
}

impl<F> SelectionListener for F
where
    F: FnMut(&SelectionSet) + Send,
{
    fn selection_changed(&mut self, selection: &SelectionSet) {
        self(selection)
    }
}

/// What the parent form hands the picker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickerProps {
    pub selected: SelectionSet,
    /// Tests linked to the parent record before the picker loaded
    pub existing: Vec<AssociationStub>,
}

impl PickerProps {
    pub fn new(selected: SelectionSet, existing: Vec<AssociationStub>) -> Self {
        Self { selected, existing }
    }
}

/// How a catalog response was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Page is now shown
    Applied,
    /// Failure is now shown
    Failed,
    /// Response belonged to an older key and was not shown
    Stale,
    /// Picker was deactivated before the response arrived
    Detached,
}

/// Render-ready view state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerSnapshot {
    pub phase: PickerPhase,
    pub search: SearchState,
    pub filters: CatalogFilters,
    pub selected_ids: Vec<TestId>,
    /// Selected tests that resolve to a record, in selection order
    pub selected: Vec<CatalogItem>,
    /// Current page minus what is already selected
    pub available: Vec<CatalogItem>,
    /// Server-side match count for the current page
    pub total: u64,
    pub error: Option<String>,
    pub retryable: bool,
    /// RFC 3339 time the shown page was received
    pub loaded_at: Option<String>,
}

#[derive(Debug, Clone)]
struct Failure {
    message: String,
    retryable: bool,
}

/// State for one mounted picker.
pub struct PickerViewModel {
    label: FallbackLabel,
    debouncer: Debouncer<String>,
    cache: QueryCache,
    search: SearchState,
    filters: CatalogFilters,
    /// Key whose response is wanted
    current: Option<CatalogQuery>,
    awaiting: bool,
    active: bool,
    phase: PickerPhase,
    /// Last good page, kept through failures
    page: Option<CatalogPage>,
    loaded_at: Option<String>,
    failure: Option<Failure>,
    selection: SelectionSet,
    existing: Vec<AssociationStub>,
    index: MergedIndex,
    listener: Option<Box<dyn SelectionListener>>,
}

impl std::fmt::Debug for PickerViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickerViewModel")
            .field("phase", &self.phase)
            .field("search", &self.search)
            .field("current", &self.current)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl PickerViewModel {
    /// Create a picker for the given parent props.
    pub fn new(config: &PickerConfig, props: PickerProps) -> Self {
        let label = config.label();
        let index = merge(&[], &props.existing, &label);
        Self {
            label,
            debouncer: Debouncer::new(config.debounce()),
            cache: QueryCache::new(config.cache_ttl(), config.cache_capacity),
            search: SearchState::default(),
            filters: config.initial_filters(),
            current: None,
            awaiting: false,
            active: true,
            phase: PickerPhase::Idle,
            page: None,
            loaded_at: None,
            failure: None,
            selection: props.selected,
            existing: props.existing,
            index,
            listener: None,
        }
    }

    /// Attach the parent's change listener.
    pub fn with_listener(mut self, listener: impl SelectionListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn set_listener(&mut self, listener: Box<dyn SelectionListener>) {
        self.listener = Some(listener);
    }

    // =========================================================================
    // Search lifecycle
    // =========================================================================

    /// Issue the initial browse query. Only does something while idle.
    pub fn activate(&mut self, now: Instant) -> Option<CatalogQuery> {
        if !self.active || self.phase != PickerPhase::Idle || self.current.is_some() {
            return None;
        }
        self.issue(now)
    }

    /// Record a keystroke. The query waits for the debounce interval.
    pub fn input(&mut self, term: impl Into<String>, now: Instant) {
        if !self.active {
            return;
        }
        let term = term.into();
        self.search.raw_term = term.clone();
        self.debouncer.observe(term, now);
        self.phase = PickerPhase::Searching;
    }

    /// When the pending keystroke settles, if one is pending.
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Advance the clock. Returns a query to run if the term just settled
    /// and the cache could not answer it.
    pub fn poll(&mut self, now: Instant) -> Option<CatalogQuery> {
        let settled = self.debouncer.settle(now)?;
        // Surrounding whitespace never changes the server's answer
        let term = settled.trim().to_string();

        if term == self.search.settled_term && self.current.is_some() {
            self.phase = self.resting_phase();
            return None;
        }
        self.search.settled_term = term;
        self.issue(now)
    }

    /// Change filters and re-query the settled term right away.
    pub fn set_filters(&mut self, filters: CatalogFilters, now: Instant) -> Option<CatalogQuery> {
        if !self.active || filters == self.filters {
            return None;
        }
        self.filters = filters;
        self.issue(now)
    }

    /// Re-issue the current query after a failure.
    pub fn retry(&mut self, now: Instant) -> Option<CatalogQuery> {
        if !self.active || self.failure.is_none() || self.awaiting {
            return None;
        }
        self.issue(now)
    }

    /// Hand a catalog response back to the picker.
    pub fn apply_response(
        &mut self,
        query: CatalogQuery,
        result: CatalogResult<CatalogPage>,
        now: Instant,
    ) -> ResponseOutcome {
        if !self.active {
            debug!(term = %query.term, "response after deactivation ignored");
            return ResponseOutcome::Detached;
        }
        let is_current = self.current.as_ref() == Some(&query);

        match result {
            Ok(page) => {
                self.cache.insert(query.clone(), page.clone(), now);
                if !is_current {
                    debug!(term = %query.term, "stale catalog page discarded");
                    return ResponseOutcome::Stale;
                }
                self.show_page(page);
                ResponseOutcome::Applied
            }
            Err(err) => {
                if !is_current {
                    debug!(term = %query.term, error = %err, "stale catalog failure discarded");
                    return ResponseOutcome::Stale;
                }
                warn!(term = %query.term, error = %err, "catalog fetch failed");
                self.awaiting = false;
                self.failure = Some(Failure {
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                });
                if !self.debouncer.is_pending() {
                    self.phase = PickerPhase::Error;
                }
                ResponseOutcome::Failed
            }
        }
    }

    /// Tear down: cancel the pending keystroke and ignore later responses.
    pub fn deactivate(&mut self) {
        if self.debouncer.cancel().is_some() {
            debug!("pending search cancelled on deactivate");
        }
        self.active = false;
        self.awaiting = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn issue(&mut self, now: Instant) -> Option<CatalogQuery> {
        let query = CatalogQuery::new(self.search.settled_term.clone(), self.filters.clone());
        self.current = Some(query.clone());

        let purged = self.cache.purge_expired(now);
        if purged > 0 {
            debug!(purged, "expired catalog pages dropped");
        }
        if let Some(page) = self.cache.get(&query, now).cloned() {
            debug!(term = %query.term, "catalog cache hit");
            self.show_page(page);
            return None;
        }

        debug!(term = %query.term, category = ?query.filters.category, "catalog query issued");
        self.awaiting = true;
        self.phase = if self.debouncer.is_pending() {
            PickerPhase::Searching
        } else {
            PickerPhase::Loading
        };
        Some(query)
    }

    fn show_page(&mut self, page: CatalogPage) {
        self.index = merge(&page.items, &self.existing, &self.label);
        self.page = Some(page);
        self.loaded_at = Some(chrono::Utc::now().to_rfc3339());
        self.failure = None;
        self.awaiting = false;
        if !self.debouncer.is_pending() {
            self.phase = PickerPhase::Loaded;
        }
    }

    fn resting_phase(&self) -> PickerPhase {
        if self.awaiting {
            PickerPhase::Loading
        } else if self.failure.is_some() {
            PickerPhase::Error
        } else if self.page.is_some() {
            PickerPhase::Loaded
        } else {
            PickerPhase::Idle
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn toggle(&mut self, id: TestId) -> SelectionSet {
        let next = self.selection.toggle(id);
        self.commit(next)
    }

    pub fn add(&mut self, id: TestId) -> SelectionSet {
        let next = self.selection.add(id);
        self.commit(next)
    }

    pub fn remove(&mut self, id: TestId) -> SelectionSet {
        let next = self.selection.remove(id);
        self.commit(next)
    }

    /// Accept the parent's current selection without notifying it.
    pub fn set_selection(&mut self, selection: SelectionSet) {
        self.selection = selection;
    }

    /// Accept an updated list of pre-linked tests.
    pub fn set_existing(&mut self, existing: Vec<AssociationStub>) {
        self.existing = existing;
        self.rebuild_index();
    }

    fn commit(&mut self, next: SelectionSet) -> SelectionSet {
        if next != self.selection {
            self.selection = next.clone();
            if let Some(listener) = self.listener.as_mut() {
                listener.selection_changed(&next);
            }
        }
        next
    }

    fn rebuild_index(&mut self) {
        let items = self.page.as_ref().map(|p| p.items.as_slice()).unwrap_or(&[]);
        self.index = merge(items, &self.existing, &self.label);
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn phase(&self) -> PickerPhase {
        self.phase
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn filters(&self) -> &CatalogFilters {
        &self.filters
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn page(&self) -> Option<&CatalogPage> {
        self.page.as_ref()
    }

    pub fn index(&self) -> &MergedIndex {
        &self.index
    }

    pub fn last_error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    /// Selected tests with full detail. Unresolvable identifiers are skipped
    /// but stay selected.
    pub fn selected_details(&self) -> Vec<CatalogItem> {
        self.index.resolve(self.selection.ids()).cloned().collect()
    }

    /// Tests on the current page that are not selected yet.
    pub fn available_items(&self) -> Vec<CatalogItem> {
        self.page
            .iter()
            .flat_map(|page| page.items.iter())
            .filter(|item| !self.selection.contains(item.id))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> PickerSnapshot {
        PickerSnapshot {
            phase: self.phase,
            search: self.search.clone(),
            filters: self.filters.clone(),
            selected_ids: self.selection.to_vec(),
            selected: self.selected_details(),
            available: self.available_items(),
            total: self.page.as_ref().map(|p| p.total).unwrap_or(0),
            error: self.failure.as_ref().map(|f| f.message.clone()),
            retryable: self.failure.as_ref().map(|f| f.retryable).unwrap_or(false),
            loaded_at: self.loaded_at.clone(),
        }
    }
}
