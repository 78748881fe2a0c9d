//! `reqwest` transport for the catalog API.

use std::time::Duration;

use async_trait::async_trait;
use lab_picker_core::{CatalogError, CatalogPage, CatalogQuery, CatalogResult, CatalogSource};
use tracing::debug;

use crate::codec::{decode_response, CatalogRequest};
use crate::{AdapterError, AdapterResult, HttpCatalogConfig};

const USER_AGENT: &str = concat!("lab-picker/", env!("CARGO_PKG_VERSION"));

/// Catalog source that calls the hospital REST API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    config: HttpCatalogConfig,
}

impl HttpCatalog {
    pub fn new(config: HttpCatalogConfig) -> AdapterResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(AdapterError::Client)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, request: &CatalogRequest) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), request.path)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch(&self, query: &CatalogQuery) -> CatalogResult<CatalogPage> {
        let request = CatalogRequest::for_query(query);
        debug!(%request, "catalog request");

        let mut builder = self
            .client
            .get(self.endpoint(&request))
            .query(&request.params)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.config.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| CatalogError::RemoteUnavailable(format!("request failed: {err}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| CatalogError::RemoteUnavailable(format!("failed to read response: {err}")))?;

        decode_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base() {
        let catalog = HttpCatalog::new(HttpCatalogConfig {
            base_url: "https://admin.example-hospital.org/api/".into(),
            ..HttpCatalogConfig::default()
        })
        .unwrap();
        let request = CatalogRequest::for_query(&CatalogQuery::new("cbc", Default::default()));

        assert_eq!(
            catalog.endpoint(&request),
            "https://admin.example-hospital.org/api/lab-tests"
        );
    }

    #[test]
    fn test_rejects_missing_scheme() {
        let result = HttpCatalog::new(HttpCatalogConfig {
            base_url: "admin.example-hospital.org".into(),
            ..HttpCatalogConfig::default()
        });
        assert!(matches!(result, Err(AdapterError::InvalidBaseUrl(_))));
    }
}
