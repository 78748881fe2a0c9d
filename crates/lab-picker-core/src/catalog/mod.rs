//! Remote catalog access.
//!
//! [`CatalogSource`] is the seam to the hospital REST API. The picker never
//! talks to it directly: the session driver (or the host, through the FFI
//! object) runs fetches and hands results back to the view model.

mod cache;
mod memory;

pub use cache::*;
pub use memory::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CatalogPage, CatalogQuery};

/// Catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Malformed catalog response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid catalog request: {0}")]
    InvalidRequest(String),
}

impl CatalogError {
    /// Whether asking again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::RemoteUnavailable(_))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Anything that can answer a catalog query.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, query: &CatalogQuery) -> CatalogResult<CatalogPage>;
}

#[async_trait]
impl<S: CatalogSource + ?Sized> CatalogSource for std::sync::Arc<S> {
    async fn fetch(&self, query: &CatalogQuery) -> CatalogResult<CatalogPage> {
        (**self).fetch(query).await
    }
}
