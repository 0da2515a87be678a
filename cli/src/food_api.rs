use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;

use nutrik_core::food_api::{AnalyzedMeal, Food, decode_foods, decode_meal};

/// HTTP client for the nutrition lookup service.
pub struct FoodApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct PictureRequest<'a> {
    picture: &'a str,
}

impl FoodApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "nutrik-cli/{} (food tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<Vec<Food>> {
        if query.trim().is_empty() {
            bail!("Search query cannot be empty");
        }
        let page = page.to_string();
        let resp = self
            .client
            .get(self.url("api/search"))
            .query(&[("q", query), ("page", page.as_str())])
            .send()
            .await
            .context("Failed to reach the food API")?;
        let body = resp.text().await.context("Failed to read search response")?;
        debug!(query, bytes = body.len(), "search response");
        decode_foods(&body).with_context(|| format!("Search for '{query}' failed"))
    }

    pub async fn lookup_barcode(&self, barcode: &str) -> Result<Vec<Food>> {
        let resp = self
            .client
            .get(self.url("api/barcode/search"))
            .query(&[("barcode", barcode)])
            .send()
            .await
            .context("Failed to reach the food API")?;
        let body = resp
            .text()
            .await
            .context("Failed to read barcode response")?;
        decode_foods(&body).with_context(|| format!("Barcode lookup for '{barcode}' failed"))
    }

    /// Send a base64-encoded photo for meal recognition.
    pub async fn analyze_picture(&self, picture: &str) -> Result<AnalyzedMeal> {
        let resp = self
            .client
            .post(self.url("api/picture"))
            .json(&PictureRequest { picture })
            .send()
            .await
            .context("Failed to reach the food API")?;
        let body = resp
            .text()
            .await
            .context("Failed to read picture analysis response")?;
        decode_meal(&body).context("Picture analysis failed")
    }
}

fn normalize_base(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("http://localhost:3000"), "http://localhost:3000/");
        assert_eq!(normalize_base("http://localhost:3000/"), "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_url_join() {
        let client = FoodApiClient::new("http://localhost:3000").unwrap();
        assert_eq!(client.url("api/search"), "http://localhost:3000/api/search");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let client = FoodApiClient::new(DEFAULT_API_URL).unwrap();
        assert!(client.search("  ", 0).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_search() {
        let client = FoodApiClient::new(DEFAULT_API_URL).unwrap();
        let foods = client.search("banana", 0).await.unwrap();
        assert!(!foods.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_barcode() {
        let client = FoodApiClient::new(DEFAULT_API_URL).unwrap();
        client.lookup_barcode("3017620422003").await.unwrap();
    }
}
