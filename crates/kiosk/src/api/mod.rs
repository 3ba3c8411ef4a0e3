//! Clients for the remote snack API.
//!
//! # Architecture
//!
//! - The remote API is the source of truth for products - NO local sync,
//!   NO caching; every page view re-fetches
//! - One shared `reqwest::Client` per kiosk process, cloned into each client
//! - Wire records are loosely typed and normalized in [`conversions`]
//!
//! # Endpoints
//!
//! ```text
//! GET  /products          - full catalog (JSON array)
//! GET  /product?id=<id>   - single product summary
//! POST /analyze-image     - multipart field `file`, still image
//! POST /analyze-audio     - multipart field `file`, audio recording
//! ```

pub mod analysis;
pub mod catalog;
mod conversions;

pub use analysis::AnalysisClient;
pub use catalog::{CatalogClient, CatalogError, ProductListing, ProductSummary};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use crate::config::ApiConfig;

/// Header that makes ngrok tunnels skip their HTML interstitial.
pub const TUNNEL_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

/// Number of body characters kept when logging a bad upstream response.
pub(crate) const LOG_BODY_PREFIX: usize = 500;

/// Build the HTTP client shared by the catalog and analysis clients.
///
/// # Errors
///
/// Returns error if the HTTP client fails to build.
pub fn build_http_client(config: &ApiConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if config.skip_tunnel_warning {
        headers.insert(TUNNEL_WARNING_HEADER, HeaderValue::from_static("true"));
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(concat!("nutrition-kiosk/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Keep the first [`LOG_BODY_PREFIX`] characters of a response body.
pub(crate) fn body_prefix(body: &str) -> String {
    body.chars().take(LOG_BODY_PREFIX).collect()
}
