//! Admin API client
//!
//! Pages through the products endpoint 250 at a time, following the cursor
//! in the `Link: <...>; rel="next"` response header.

use std::time::Duration;

use reqwest::header::LINK;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::SyncError;
use crate::data::Product;

const PAGE_LIMIT: &str = "250";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    products: Vec<Product>,
}

/// Client for the products endpoint of the admin API
#[derive(Debug, Clone)]
pub struct AdminClient {
    http_client: Client,
    endpoint: Url,
    access_token: String,
    page_delay: Duration,
}

impl AdminClient {
    /// Creates a client for `store` (a bare domain or a full base URL)
    pub fn new(store: &str, api_version: &str, access_token: &str) -> Result<Self, SyncError> {
        let base = if store.starts_with("http://") || store.starts_with("https://") {
            store.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", store.trim_end_matches('/'))
        };
        Self::with_endpoint(
            &format!("{base}/admin/api/{api_version}/products.json"),
            access_token,
        )
    }

    /// Creates a client for an explicit products endpoint URL
    pub fn with_endpoint(endpoint: &str, access_token: &str) -> Result<Self, SyncError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| SyncError::InvalidUrl(endpoint.to_string()))?;
        Ok(Self {
            http_client: Client::new(),
            endpoint,
            access_token: access_token.to_string(),
            page_delay: Duration::from_millis(100),
        })
    }

    /// Sets the pause between page requests
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn page_url(&self, page_info: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", PAGE_LIMIT);
            if let Some(cursor) = page_info {
                query.append_pair("page_info", cursor);
            }
        }
        url
    }

    /// Fetches every product, page by page
    pub async fn fetch_all(&self) -> Result<Vec<Product>, SyncError> {
        let mut all_products = Vec::new();
        let mut page_info: Option<String> = None;
        let mut page = 0;

        loop {
            page += 1;
            let url = self.page_url(page_info.as_deref());
            debug!(page, "Fetching products page");

            let response = self
                .http_client
                .get(url.clone())
                .header(ACCESS_TOKEN_HEADER, &self.access_token)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_page_info);
            let body = response.bytes().await?;
            let products = serde_json::from_slice::<ProductsPage>(&body)?.products;

            if products.is_empty() {
                debug!(page, "No more products");
                break;
            }
            all_products.extend(products);
            info!(page, total = all_products.len(), "Fetched products page");

            match next {
                Some(cursor) => page_info = Some(cursor),
                None => break,
            }
            tokio::time::sleep(self.page_delay).await;
        }

        info!(total = all_products.len(), pages = page, "Fetched all products");
        Ok(all_products)
    }
}

/// Extracts the `page_info` cursor of the `rel="next"` entry of a Link header
pub fn next_page_info(link: &str) -> Option<String> {
    link.split(',')
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            part.get(start..end)
        })
        .and_then(|target| Url::parse(target).ok())
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page_info")
                .map(|(_, value)| value.into_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/admin/api/2023-10/products.json";

    fn page(ids: &[u64]) -> String {
        let products: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id": {id}, "title": "Product {id}"}}"#))
            .collect();
        format!(r#"{{"products": [{}]}}"#, products.join(","))
    }

    #[test]
    fn test_next_page_info_picks_next_entry() {
        let link = r#"<https://shop.example/admin/api/2023-10/products.json?limit=250&page_info=prev123>; rel="previous", <https://shop.example/admin/api/2023-10/products.json?limit=250&page_info=next456>; rel="next""#;
        assert_eq!(next_page_info(link).as_deref(), Some("next456"));
    }

    #[test]
    fn test_next_page_info_without_next() {
        let link = r#"<https://shop.example/products.json?page_info=prev>; rel="previous""#;
        assert!(next_page_info(link).is_none());
        assert!(next_page_info("").is_none());
    }

    #[test]
    fn test_new_builds_endpoint_from_domain() {
        let client = AdminClient::new("shop.myshopify.com", "2023-10", "token").unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://shop.myshopify.com/admin/api/2023-10/products.json"
        );

        let client = AdminClient::new("http://localhost:1234/", "2024-01", "token").unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:1234/admin/api/2024-01/products.json"
        );
    }

    #[tokio::test]
    async fn test_fetch_all_follows_link_header() {
        let mut server = mockito::Server::new_async().await;
        let next = format!(
            r#"<{}{PATH}?limit=250&page_info=abc>; rel="next""#,
            server.url()
        );
        let first = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("limit=250".to_string()))
            .match_header("x-shopify-access-token", "secret")
            .with_status(200)
            .with_header("link", next.as_str())
            .with_body(page(&[1, 2]))
            .create_async()
            .await;
        let second = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("limit=250&page_info=abc".to_string()))
            .with_status(200)
            .with_body(page(&[3]))
            .create_async()
            .await;

        let client = AdminClient::new(&server.url(), "2023-10", "secret")
            .unwrap()
            .with_page_delay(Duration::ZERO);
        let products = client.fetch_all().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<u64> = products.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_empty_page() {
        let mut server = mockito::Server::new_async().await;
        let next = format!(r#"<{}{PATH}?page_info=more>; rel="next""#, server.url());
        let _mock = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("link", next.as_str())
            .with_body(r#"{"products": []}"#)
            .create_async()
            .await;

        let client = AdminClient::new(&server.url(), "2023-10", "secret").unwrap();
        let products = client.fetch_all().await.unwrap();

        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_reports_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"errors": "Invalid API key"}"#)
            .create_async()
            .await;

        let client = AdminClient::new(&server.url(), "2023-10", "wrong").unwrap();
        let err = client.fetch_all().await.unwrap_err();

        assert!(matches!(err, SyncError::Status { status: 401, .. }));
    }
}
