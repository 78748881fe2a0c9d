//! Lab test catalog models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a lab test in the remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(pub i64);

impl TestId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TestId {
    fn from(id: i64) -> Self {
        TestId(id)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single lab test as returned by the catalog API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    /// Catalog identifier - unique
    pub id: TestId,
    /// Display name (e.g., "Complete Blood Count")
    pub name: String,
    /// Short code (e.g., "CBC")
    #[serde(default)]
    pub code: String,
    /// List price
    #[serde(default)]
    pub price: f64,
    /// Category identifier, if the catalog groups tests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CatalogItem {
    /// Create a new catalog item with required fields.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: TestId(id),
            name: name.into(),
            code: String::new(),
            price: 0.0,
            category: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A lab test already linked to the parent record (package, doctor order)
/// before the picker loaded.
///
/// Parent forms disagree on which field carries the identity: join rows use
/// `testId`, embedded test records use `id`. `testId` wins when both exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssociationStub {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<TestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl AssociationStub {
    /// Stub identified by a join-row `testId`.
    pub fn for_test(test_id: i64) -> Self {
        Self {
            test_id: Some(TestId(test_id)),
            ..Self::default()
        }
    }

    /// Stub identified by an embedded record `id`.
    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(TestId(id)),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The identifier this stub stands for, if it carries one.
    pub fn effective_id(&self) -> Option<TestId> {
        self.test_id.or(self.id)
    }
}

impl From<&CatalogItem> for AssociationStub {
    fn from(item: &CatalogItem) -> Self {
        Self {
            test_id: None,
            id: Some(item.id),
            name: Some(item.name.clone()),
            code: Some(item.code.clone()),
            price: Some(item.price),
        }
    }
}
