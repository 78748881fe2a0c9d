//! REST adapter for the lab test picker.
//!
//! This crate connects the picker to the hospital admin API
//! (`GET /lab-tests`). The request/response codec and the [`MockCatalog`]
//! are always available; the `reqwest` transport ([`HttpCatalog`]) is behind
//! the `http` feature.

pub mod codec;
pub mod mock;

#[cfg(feature = "http")]
pub mod client;

pub use codec::*;
pub use mock::*;

#[cfg(feature = "http")]
pub use client::HttpCatalog;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Adapter errors.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[cfg(feature = "http")]
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Connection settings for the catalog API.
///
/// Session storage lives in the host; it passes the current bearer token in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpCatalogConfig {
    /// API root, e.g. `https://admin.example-hospital.org/api`
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpCatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            bearer_token: None,
            timeout_secs: 10,
        }
    }
}

impl HttpCatalogConfig {
    pub fn validate(&self) -> AdapterResult<()> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AdapterError::InvalidBaseUrl(format!(
                "{} (expected http:// or https://)",
                self.base_url
            )));
        }
        Ok(())
    }
}
