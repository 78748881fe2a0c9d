//! Lab Picker Core Library
//!
//! Debounced search-and-select for lab tests in the hospital admin console.
//! Package and doctor-order forms embed the picker to link lab tests to a
//! parent record.
//!
//! # Architecture
//!
//! ```text
//!  keystrokes ──▶ Debouncer ──settled term──▶ QueryCache ──miss──▶ CatalogSource
//!                                                │                     │
//!                                               hit            (stale pages dropped)
//!                                                │                     │
//!                                                ▼                     ▼
//!  existing stubs ─────────────────────────▶ merge(page, stubs) ─▶ MergedIndex
//!                                                                      │
//!  parent selection ──▶ SelectionSet ──toggle/add/remove──▶ listener   │
//!                             │                                        │
//!                             └──────────────▶ PickerSnapshot ◀────────┘
//! ```
//!
//! # Core Principle
//!
//! **The parent form owns the selection.** The picker only proposes new sets
//! through its listener and never persists anything itself.
//!
//! # Modules
//!
//! - [`models`]: Domain types (CatalogItem, AssociationStub, CatalogQuery, etc.)
//! - [`debounce`]: Clock-driven input debouncer
//! - [`catalog`]: Catalog source trait, TTL query cache, in-memory catalog
//! - [`merge`]: Identity-preserving merge of fetched items and stubs
//! - [`selection`]: Immutable selection set
//! - [`picker`]: View model state machine
//! - [`session`]: Async driver on tokio
//! - [`config`]: TOML configuration

pub mod catalog;
pub mod config;
pub mod debounce;
pub mod merge;
pub mod models;
pub mod picker;
pub mod selection;
pub mod session;

// Re-export commonly used types
pub use catalog::{CatalogError, CatalogResult, CatalogSource, QueryCache, StaticCatalog};
pub use config::{ConfigError, PickerConfig};
pub use debounce::Debouncer;
pub use merge::{merge, FallbackLabel, MergedIndex, RecordOrigin};
pub use models::{
    AssociationStub, CatalogFilters, CatalogItem, CatalogPage, CatalogQuery, SearchState, TestId,
};
pub use picker::{
    PickerPhase, PickerProps, PickerSnapshot, PickerViewModel, ResponseOutcome, SelectionListener,
};
pub use selection::SelectionSet;
pub use session::{PickerCommand, PickerHandle, PickerSession, SessionError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};
use std::time::Instant;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LabPickerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Picker state error: {0}")]
    StateError(String),
}

impl From<ConfigError> for LabPickerError {
    fn from(e: ConfigError) -> Self {
        LabPickerError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for LabPickerError {
    fn from(e: serde_json::Error) -> Self {
        LabPickerError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LabPickerError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LabPickerError::StateError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open a picker for a parent form.
///
/// `config_toml` may be a partial document; missing keys use defaults.
#[uniffi::export]
pub fn open_picker(
    config_toml: Option<String>,
    selected_ids: Vec<i64>,
    existing: Vec<FfiAssociationStub>,
) -> Result<Arc<LabPicker>, LabPickerError> {
    let config = match config_toml {
        Some(source) => PickerConfig::from_toml_str(&source)?,
        None => PickerConfig::default(),
    };
    let props = PickerProps::new(
        SelectionSet::from_ids(selected_ids),
        existing.into_iter().map(Into::into).collect(),
    );
    Ok(Arc::new(LabPicker {
        vm: Mutex::new(PickerViewModel::new(&config, props)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Host callback for selection changes.
#[uniffi::export(callback_interface)]
pub trait FfiSelectionListener: Send + Sync {
    fn on_selection_change(&self, selected_ids: Vec<i64>);
}

struct HostListener(Box<dyn FfiSelectionListener>);

impl SelectionListener for HostListener {
    fn selection_changed(&mut self, selection: &SelectionSet) {
        self.0.on_selection_change(ids_to_ffi(selection.ids()));
    }
}

/// Thread-safe picker wrapper for FFI.
///
/// The host owns the network: it asks for a query after each `poll`, runs
/// it, and reports the page or the failure back.
#[derive(uniffi::Object)]
pub struct LabPicker {
    vm: Mutex<PickerViewModel>,
}

#[uniffi::export]
impl LabPicker {
    // =========================================================================
    // Search Operations
    // =========================================================================

    /// Register the parent form's selection callback.
    pub fn set_listener(&self, listener: Box<dyn FfiSelectionListener>) -> Result<(), LabPickerError> {
        let mut vm = self.vm.lock()?;
        vm.set_listener(Box::new(HostListener(listener)));
        Ok(())
    }

    /// Initial browse query, if the picker has not queried yet.
    pub fn activate(&self) -> Result<Option<FfiCatalogQuery>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(vm.activate(Instant::now()).map(Into::into))
    }

    /// Record a keystroke.
    pub fn input(&self, term: String) -> Result<(), LabPickerError> {
        let mut vm = self.vm.lock()?;
        vm.input(term, Instant::now());
        Ok(())
    }

    /// Milliseconds until the pending keystroke settles.
    pub fn settle_in_ms(&self) -> Result<Option<u64>, LabPickerError> {
        let vm = self.vm.lock()?;
        let now = Instant::now();
        Ok(vm
            .settle_deadline()
            .map(|deadline| millis_saturating(deadline.saturating_duration_since(now))))
    }

    /// Advance the clock; returns a query for the host to run.
    pub fn poll(&self) -> Result<Option<FfiCatalogQuery>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(vm.poll(Instant::now()).map(Into::into))
    }

    pub fn set_filters(&self, filters: FfiCatalogFilters) -> Result<Option<FfiCatalogQuery>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(vm.set_filters(filters.into(), Instant::now()).map(Into::into))
    }

    pub fn retry(&self) -> Result<Option<FfiCatalogQuery>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(vm.retry(Instant::now()).map(Into::into))
    }

    /// Report a fetched page. Returns false if the page was stale.
    pub fn apply_page(
        &self,
        query: FfiCatalogQuery,
        items: Vec<FfiCatalogItem>,
        total: u64,
    ) -> Result<bool, LabPickerError> {
        let page = CatalogPage {
            items: items.into_iter().map(Into::into).collect(),
            total,
        };
        let mut vm = self.vm.lock()?;
        let outcome = vm.apply_response(query.into(), Ok(page), Instant::now());
        Ok(outcome == ResponseOutcome::Applied)
    }

    /// Report a raw `{ items, total }` response body.
    pub fn apply_page_json(&self, query: FfiCatalogQuery, body: String) -> Result<bool, LabPickerError> {
        let result = serde_json::from_str::<CatalogPage>(&body).map_err(CatalogError::from);
        let mut vm = self.vm.lock()?;
        let outcome = vm.apply_response(query.into(), result, Instant::now());
        Ok(outcome == ResponseOutcome::Applied)
    }

    /// Report a failed fetch.
    pub fn apply_failure(&self, query: FfiCatalogQuery, message: String) -> Result<bool, LabPickerError> {
        let mut vm = self.vm.lock()?;
        let outcome = vm.apply_response(
            query.into(),
            Err(CatalogError::RemoteUnavailable(message)),
            Instant::now(),
        );
        Ok(outcome == ResponseOutcome::Failed)
    }

    // =========================================================================
    // Selection Operations
    // =========================================================================

    pub fn toggle(&self, id: i64) -> Result<Vec<i64>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(ids_to_ffi(vm.toggle(TestId(id)).ids()))
    }

    pub fn add(&self, id: i64) -> Result<Vec<i64>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(ids_to_ffi(vm.add(TestId(id)).ids()))
    }

    pub fn remove(&self, id: i64) -> Result<Vec<i64>, LabPickerError> {
        let mut vm = self.vm.lock()?;
        Ok(ids_to_ffi(vm.remove(TestId(id)).ids()))
    }

    /// Push the parent's selection into the picker without a callback.
    pub fn set_selection(&self, selected_ids: Vec<i64>) -> Result<(), LabPickerError> {
        let mut vm = self.vm.lock()?;
        vm.set_selection(SelectionSet::from_ids(selected_ids));
        Ok(())
    }

    pub fn set_existing(&self, existing: Vec<FfiAssociationStub>) -> Result<(), LabPickerError> {
        let mut vm = self.vm.lock()?;
        vm.set_existing(existing.into_iter().map(Into::into).collect());
        Ok(())
    }

    // =========================================================================
    // View Operations
    // =========================================================================

    pub fn snapshot(&self) -> Result<FfiPickerSnapshot, LabPickerError> {
        let vm = self.vm.lock()?;
        Ok(vm.snapshot().into())
    }

    /// View state as JSON, for web renderers.
    pub fn snapshot_json(&self) -> Result<String, LabPickerError> {
        let vm = self.vm.lock()?;
        Ok(serde_json::to_string(&vm.snapshot())?)
    }

    /// Unmount: cancel the pending keystroke and ignore later responses.
    pub fn close(&self) -> Result<(), LabPickerError> {
        let mut vm = self.vm.lock()?;
        vm.deactivate();
        Ok(())
    }
}

fn millis_saturating(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn ids_to_ffi(ids: &[TestId]) -> Vec<i64> {
    ids.iter().map(|id| id.get()).collect()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe catalog item.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiCatalogItem {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub price: f64,
    pub category: Option<String>,
}

impl From<CatalogItem> for FfiCatalogItem {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id.get(),
            name: item.name,
            code: item.code,
            price: item.price,
            category: item.category,
        }
    }
}

impl From<FfiCatalogItem> for CatalogItem {
    fn from(item: FfiCatalogItem) -> Self {
        CatalogItem {
            id: TestId(item.id),
            name: item.name,
            code: item.code,
            price: item.price,
            category: item.category,
        }
    }
}

/// FFI-safe association stub.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAssociationStub {
    pub test_id: Option<i64>,
    pub id: Option<i64>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub price: Option<f64>,
}

impl From<FfiAssociationStub> for AssociationStub {
    fn from(stub: FfiAssociationStub) -> Self {
        AssociationStub {
            test_id: stub.test_id.map(TestId),
            id: stub.id.map(TestId),
            name: stub.name,
            code: stub.code,
            price: stub.price,
        }
    }
}

/// FFI-safe catalog filters.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiCatalogFilters {
    pub category: Option<String>,
    pub active_only: bool,
    pub page_size: u32,
}

impl From<FfiCatalogFilters> for CatalogFilters {
    fn from(filters: FfiCatalogFilters) -> Self {
        CatalogFilters {
            category: filters.category,
            active_only: filters.active_only,
            page_size: filters.page_size,
        }
    }
}

impl From<CatalogFilters> for FfiCatalogFilters {
    fn from(filters: CatalogFilters) -> Self {
        Self {
            category: filters.category,
            active_only: filters.active_only,
            page_size: filters.page_size,
        }
    }
}

/// FFI-safe catalog query. Hand it back unchanged with the response.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiCatalogQuery {
    pub term: String,
    pub filters: FfiCatalogFilters,
}

impl From<CatalogQuery> for FfiCatalogQuery {
    fn from(query: CatalogQuery) -> Self {
        Self {
            term: query.term,
            filters: query.filters.into(),
        }
    }
}

impl From<FfiCatalogQuery> for CatalogQuery {
    fn from(query: FfiCatalogQuery) -> Self {
        CatalogQuery::new(query.term, query.filters.into())
    }
}

/// FFI-safe picker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiPickerPhase {
    Idle,
    Searching,
    Loading,
    Loaded,
    Error,
}

impl From<PickerPhase> for FfiPickerPhase {
    fn from(phase: PickerPhase) -> Self {
        match phase {
            PickerPhase::Idle => FfiPickerPhase::Idle,
            PickerPhase::Searching => FfiPickerPhase::Searching,
            PickerPhase::Loading => FfiPickerPhase::Loading,
            PickerPhase::Loaded => FfiPickerPhase::Loaded,
            PickerPhase::Error => FfiPickerPhase::Error,
        }
    }
}

/// FFI-safe view state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPickerSnapshot {
    pub phase: FfiPickerPhase,
    pub raw_term: String,
    pub settled_term: String,
    pub selected_ids: Vec<i64>,
    pub selected: Vec<FfiCatalogItem>,
    pub available: Vec<FfiCatalogItem>,
    pub total: u64,
    pub error: Option<String>,
    pub retryable: bool,
}

impl From<PickerSnapshot> for FfiPickerSnapshot {
    fn from(snapshot: PickerSnapshot) -> Self {
        Self {
            phase: snapshot.phase.into(),
            raw_term: snapshot.search.raw_term,
            settled_term: snapshot.search.settled_term,
            selected_ids: ids_to_ffi(&snapshot.selected_ids),
            selected: snapshot.selected.into_iter().map(Into::into).collect(),
            available: snapshot.available.into_iter().map(Into::into).collect(),
            total: snapshot.total,
            error: snapshot.error,
            retryable: snapshot.retryable,
        }
    }
}
