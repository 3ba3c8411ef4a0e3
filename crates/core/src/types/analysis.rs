//! Results returned by the snack analysis service.

use serde::{Deserialize, Serialize};

use super::Price;

/// Outcome of analyzing one capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Filename the service stored the upload under.
    pub filename: String,
    pub file_size_bytes: u64,
    /// Speech-to-text output for microphone captures.
    pub transcription: Option<String>,
    pub description: String,
    /// Catalog category the kiosk should navigate to.
    pub recommended_category: String,
    pub products: Vec<RecommendedProduct>,
    pub total_products: u32,
    pub message: String,
}

impl AnalysisReport {
    /// Link to the catalog filtered by the recommended category.
    #[must_use]
    pub fn catalog_path(&self) -> String {
        let category = self.recommended_category.trim();
        if category.is_empty() {
            "/products".to_string()
        } else {
            // Form encoding, so spaces become `+`
            let encoded = urlencoding::encode(category).replace("%20", "+");
            format!("/products?category={encoded}")
        }
    }
}

/// A product suggested by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedProduct {
    pub name: String,
    pub price: Price,
}
