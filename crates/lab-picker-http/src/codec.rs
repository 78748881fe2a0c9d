//! Request and response codec for `GET /lab-tests`.

use std::fmt;

use lab_picker_core::{CatalogError, CatalogItem, CatalogPage, CatalogQuery, CatalogResult};
use serde::Deserialize;

/// Path of the catalog endpoint, relative to the API base URL.
pub const LAB_TESTS_PATH: &str = "/lab-tests";

/// Longest body excerpt carried in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// A catalog request before transport: path plus unencoded query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub path: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl CatalogRequest {
    /// Build the request for a picker query.
    ///
    /// `category` is omitted when unset and `active` when inactive tests are
    /// wanted too; the server treats a missing flag as "no filter".
    pub fn for_query(query: &CatalogQuery) -> Self {
        let mut params = vec![
            ("search", query.term.trim().to_string()),
            ("pageSize", query.filters.page_size.to_string()),
        ];
        if query.filters.active_only {
            params.push(("active", "true".to_string()));
        }
        if let Some(category) = &query.filters.category {
            params.push(("category", category.clone()));
        }

        Self {
            path: LAB_TESTS_PATH,
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for CatalogRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.path)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

/// Accepted response shapes. Older endpoints return a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseBody {
    Page(CatalogPage),
    Items(Vec<CatalogItem>),
}

/// Turn an HTTP status and body into a page or a classified error.
pub fn decode_response(status: u16, body: &str) -> CatalogResult<CatalogPage> {
    if !(200..300).contains(&status) {
        let detail = format!("HTTP {}: {}", status, excerpt(body));
        return Err(match status {
            400 | 404 | 422 => CatalogError::InvalidRequest(detail),
            _ => CatalogError::RemoteUnavailable(detail),
        });
    }

    let page = match serde_json::from_str::<ResponseBody>(body) {
        Ok(ResponseBody::Page(page)) => page,
        Ok(ResponseBody::Items(items)) => CatalogPage::new(items),
        // Re-parse strictly so the error names the real problem
        Err(_) => serde_json::from_str::<CatalogPage>(body)?,
    };
    Ok(page)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_picker_core::{CatalogFilters, TestId};

    #[test]
    fn test_request_params() {
        let query = CatalogQuery::new(
            " cbc ",
            CatalogFilters {
                category: Some("12".into()),
                active_only: true,
                page_size: 25,
            },
        );

        let request = CatalogRequest::for_query(&query);
        assert_eq!(request.path, "/lab-tests");
        assert_eq!(request.param("search"), Some("cbc"));
        assert_eq!(request.param("pageSize"), Some("25"));
        assert_eq!(request.param("active"), Some("true"));
        assert_eq!(request.param("category"), Some("12"));
        assert_eq!(
            request.to_string(),
            "GET /lab-tests?search=cbc&pageSize=25&active=true&category=12"
        );
    }

    #[test]
    fn test_request_omits_unset_filters() {
        let query = CatalogQuery::new(
            "",
            CatalogFilters {
                category: None,
                active_only: false,
                page_size: 50,
            },
        );

        let request = CatalogRequest::for_query(&query);
        assert_eq!(request.param("active"), None);
        assert_eq!(request.param("category"), None);
        assert_eq!(request.param("search"), Some(""));
    }

    #[test]
    fn test_decode_page() {
        let body = r#"{"items": [{"id": 3, "name": "BMP", "code": "BMP", "price": 18.0, "category": "chemistry"}], "total": 40}"#;
        let page = decode_response(200, body).unwrap();
        assert_eq!(page.items[0].id, TestId(3));
        assert_eq!(page.total, 40);
    }

    #[test]
    fn test_decode_bare_array() {
        let page = decode_response(200, r#"[{"id": 1, "name": "CBC"}, {"id": 2, "name": "BMP"}]"#).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_decode_classifies_status() {
        assert!(matches!(
            decode_response(503, "upstream down"),
            Err(CatalogError::RemoteUnavailable(msg)) if msg == "HTTP 503: upstream down"
        ));
        assert!(matches!(
            decode_response(422, "{\"error\": \"pageSize\"}"),
            Err(CatalogError::InvalidRequest(_))
        ));
        assert!(matches!(decode_response(200, "<html>"), Err(CatalogError::Decode(_))));
    }

    #[test]
    fn test_error_excerpt_truncated() {
        let body = "x".repeat(1000);
        let Err(CatalogError::RemoteUnavailable(msg)) = decode_response(500, &body) else {
            panic!("expected RemoteUnavailable");
        };
        assert!(msg.len() < 300);
        assert!(msg.ends_with("..."));
    }
}
