//! Scripted catalog for testing hosts without a live API.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lab_picker_core::{CatalogPage, CatalogQuery, CatalogResult, CatalogSource};

use crate::codec::{decode_response, CatalogRequest};

/// A canned HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Answers catalog queries from canned responses keyed by search term.
///
/// Responses go through the same codec as the real transport, so status
/// classification and body decoding are exercised. Unknown terms get an
/// empty page.
#[derive(Debug, Default)]
pub struct MockCatalog {
    responses: HashMap<String, CannedResponse>,
    requests: Mutex<Vec<CatalogRequest>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, term: impl Into<String>, response: CannedResponse) -> Self {
        self.responses.insert(term.into(), response);
        self
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<CatalogRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    async fn fetch(&self, query: &CatalogQuery) -> CatalogResult<CatalogPage> {
        let request = CatalogRequest::for_query(query);
        let term = request.param("search").unwrap_or_default().to_string();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        match self.responses.get(&term) {
            Some(response) => decode_response(response.status, &response.body),
            None => Ok(CatalogPage::default()),
        }
    }
}
