//! Product catalog client.
//!
//! Every call performs exactly one network read. There are no retries and no
//! cache: the kiosk shows whatever the catalog says right now.

use nutrition_kiosk_core::{Price, Product, ProductId};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use super::conversions::{
    ProductLookupResponse, ProductRecord, convert_product, convert_product_summary,
};
use super::body_prefix;
use crate::config::ApiConfig;

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("Failed to fetch products: HTTP {status} (content type: {})", .content_type.as_deref().unwrap_or("none"))]
    Status {
        status: u16,
        content_type: Option<String>,
    },

    /// The catalog answered with something other than JSON.
    #[error("Invalid content type: {} (HTTP {status})", .content_type.as_deref().unwrap_or("none"))]
    ContentType {
        status: u16,
        content_type: Option<String>,
    },

    /// The body was JSON but not catalog-shaped.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CatalogError {
    /// HTTP status of the failed response, if one arrived.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::ContentType { status, .. } => Some(*status),
            Self::Http(_) | Self::Parse(_) => None,
        }
    }
}

/// Result of listing products for a page.
///
/// An empty catalog (or an empty category) is a normal outcome and is kept
/// apart from fetch failures so pages can show "no products" instead of an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductListing {
    Products(Vec<Product>),
    Empty { category: Option<String> },
}

impl ProductListing {
    fn from_products(products: Vec<Product>, category: Option<&str>) -> Self {
        if products.is_empty() {
            Self::Empty {
                category: category.map(str::to_string),
            }
        } else {
            Self::Products(products)
        }
    }
}

/// Summary returned by the single-product lookup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub category: Option<String>,
    pub description: String,
}

/// Client for the remote product catalog.
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    products_url: String,
    product_url: String,
    config: ApiConfig,
}

impl CatalogClient {
    /// Create a new catalog client on top of a shared HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            client,
            products_url: config.endpoint("products"),
            product_url: config.endpoint("product"),
            config: config.clone(),
        }
    }

    /// Fetch the catalog, optionally keeping only one category.
    ///
    /// The category filter is applied after the fetch and matches
    /// case-insensitively. An empty result is `Ok(vec![])`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Status` for non-success responses,
    /// `CatalogError::ContentType` when the body is not JSON, and
    /// `CatalogError::Http`/`Parse` for transport or decoding failures.
    #[instrument(skip(self), fields(category = category.unwrap_or("all")))]
    pub async fn fetch_products(&self, category: Option<&str>) -> Result<Vec<Product>, CatalogError> {
        tracing::debug!(url = %self.products_url, "Fetching products");

        let response = self
            .client
            .get(&self.products_url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let records: Vec<ProductRecord> = read_json(response).await?;

        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let products: Vec<Product> = records
            .into_iter()
            .map(|r| convert_product(r, self.config.placeholder_images))
            .filter(|p| category.is_none_or(|c| p.matches_category(c)))
            .collect();

        tracing::info!(count = products.len(), "Fetched products");
        Ok(products)
    }

    /// Fetch the catalog and classify the outcome for a listing page.
    ///
    /// # Errors
    ///
    /// Same as [`CatalogClient::fetch_products`].
    pub async fn listing(&self, category: Option<&str>) -> Result<ProductListing, CatalogError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let products = self.fetch_products(category).await?;
        Ok(ProductListing::from_products(products, category))
    }

    /// Find one product by id in the full catalog.
    ///
    /// # Errors
    ///
    /// Same as [`CatalogClient::fetch_products`].
    pub async fn find_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let products = self.fetch_products(None).await?;
        Ok(products.into_iter().find(|p| p.id == id))
    }

    /// Look up a product summary via `GET /product?id=<id>`.
    ///
    /// Returns `Ok(None)` when the service reports `success: false`.
    ///
    /// # Errors
    ///
    /// Same failure classes as [`CatalogClient::fetch_products`].
    #[instrument(skip(self))]
    pub async fn lookup_product(&self, id: ProductId) -> Result<Option<ProductSummary>, CatalogError> {
        let response = self
            .client
            .get(format!("{}?id={id}", self.product_url))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let body: ProductLookupResponse = read_json(response).await?;

        if !body.success {
            tracing::info!(
                message = body.message.as_deref().unwrap_or_default(),
                "Product lookup unsuccessful"
            );
            return Ok(None);
        }

        Ok(body.product.map(convert_product_summary))
    }
}

/// Check status and content type, then decode the JSON body.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CatalogError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            content_type = content_type.as_deref().unwrap_or("none"),
            body = %body_prefix(&body),
            "Catalog returned non-success status"
        );
        return Err(CatalogError::Status {
            status: status.as_u16(),
            content_type,
        });
    }

    if !content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            content_type = content_type.as_deref().unwrap_or("none"),
            body = %body_prefix(&body),
            "Catalog returned invalid content type"
        );
        return Err(CatalogError::ContentType {
            status: status.as_u16(),
            content_type,
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body_prefix(&text),
            "Failed to parse catalog response"
        );
        CatalogError::Parse(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display_includes_status_and_content_type() {
        let err = CatalogError::Status {
            status: 503,
            content_type: Some("text/html".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch products: HTTP 503 (content type: text/html)"
        );
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_content_type_error_without_header() {
        let err = CatalogError::ContentType {
            status: 200,
            content_type: None,
        };
        assert_eq!(err.to_string(), "Invalid content type: none (HTTP 200)");
    }

    #[test]
    fn test_listing_distinguishes_empty() {
        let listing = ProductListing::from_products(Vec::new(), Some("Energy Fuel"));
        assert_eq!(
            listing,
            ProductListing::Empty {
                category: Some("Energy Fuel".to_string())
            }
        );
    }
}
