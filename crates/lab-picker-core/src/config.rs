//! Picker configuration.
//!
//! Every field has a default, so a host can ship a partial TOML document:
//!
//! ```toml
//! debounce_ms = 250
//! category = "hematology"
//! fallback_label = "Prueba #{id}"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merge::FallbackLabel;
use crate::models::CatalogFilters;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for one picker instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PickerConfig {
    /// Quiet period before a typed term is sent to the catalog
    pub debounce_ms: u64,
    /// How long a fetched page is served from cache
    pub cache_ttl_secs: u64,
    /// Maximum number of cached pages
    pub cache_capacity: usize,
    /// Items requested per catalog page
    pub page_size: u32,
    /// Only offer orderable tests
    pub active_only: bool,
    /// Initial category filter
    pub category: Option<String>,
    /// Display name template for stubs without a name; `{id}` is replaced
    pub fallback_label: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            cache_ttl_secs: 30,
            cache_capacity: 64,
            page_size: 50,
            active_only: true,
            category: None,
            fallback_label: FallbackLabel::DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PickerConfig {
    /// Parse and validate a (possibly partial) TOML document.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: PickerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the picker cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be positive".into()));
        }
        if !self.fallback_label.contains(FallbackLabel::PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "fallback_label must contain {}",
                FallbackLabel::PLACEHOLDER
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Filters the picker starts with.
    pub fn initial_filters(&self) -> CatalogFilters {
        CatalogFilters {
            category: self.category.clone(),
            active_only: self.active_only,
            page_size: self.page_size,
        }
    }

    pub fn label(&self) -> FallbackLabel {
        FallbackLabel::new(self.fallback_label.clone())
    }
}
