//! Remote food catalog over HTTP
//!
//! Expects `GET {base}/foods/{name}` to answer with a composition as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::models::NutrientComposition;
use super::Catalog;

/// Catalog served by a remote food service
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> LedgerResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LedgerError::validation("catalog_url", e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(LedgerError::validation("catalog_url", "must be an http(s) URL"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::CatalogUnavailable(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn food_url(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("foods").push(name);
        }
        url
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn lookup(&self, name: &str) -> LedgerResult<NutrientComposition> {
        let url = self.food_url(name);
        tracing::debug!(%url, "Catalog lookup");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::CatalogUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LedgerError::not_found(EntityKind::Food, name)),
            status if status.is_success() => response
                .json::<NutrientComposition>()
                .await
                .map_err(|e| LedgerError::CatalogUnavailable(format!("invalid catalog response: {}", e))),
            status => Err(LedgerError::CatalogUnavailable(format!(
                "catalog answered {} for '{}'",
                status, name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_url_encodes_name() {
        let catalog = HttpCatalog::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            catalog.food_url("Greek Yogurt").as_str(),
            "http://localhost:8080/api/foods/Greek%20Yogurt"
        );

        let catalog = HttpCatalog::new("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(catalog.food_url("Rice").as_str(), "http://localhost:8080/foods/Rice");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = HttpCatalog::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(err.is_validation());

        let err = HttpCatalog::new("mailto:food@example.com", Duration::from_secs(1)).unwrap_err();
        assert!(err.is_validation());
    }
}
