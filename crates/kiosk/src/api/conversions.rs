//! Wire records for the remote API and their conversion to core types.
//!
//! The remote service is loose with types: images sometimes arrive as a
//! JSON-encoded string instead of an array, ratings as floats, optional
//! fields as `null`. Everything is normalized here so the rest of the crate
//! only sees well-formed core types.

use nutrition_kiosk_core::{
    AnalysisReport, FlavorTag, Price, Product, ProductId, Rating, RecommendedProduct,
    dedupe_flavors,
};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::catalog::ProductSummary;

// =============================================================================
// Catalog records
// =============================================================================

/// A product as served by `GET /products`.
#[derive(Debug, Deserialize)]
pub(crate) struct ProductRecord {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Option<ImageList>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub flavor: Option<Vec<FlavorRecord>>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorRecord {
    #[serde(default)]
    pub color: Option<String>,
    pub label: String,
}

/// Image URLs as either a proper array or a single (possibly JSON-encoded) string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ImageList {
    Many(Vec<String>),
    One(String),
}

/// Response of `GET /product?id=`.
#[derive(Debug, Deserialize)]
pub(crate) struct ProductLookupResponse {
    pub success: bool,
    #[serde(default)]
    pub product: Option<ProductSummaryRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductSummaryRecord {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Analysis records
// =============================================================================

/// Response of `POST /analyze-image` and `POST /analyze-audio`.
#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeResponse {
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub analysis: Option<AnalysisRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalysisRecord {
    #[serde(default)]
    pub description: Option<String>,
    pub recommended_category: String,
    #[serde(default)]
    pub products: Option<Vec<SuggestionRecord>>,
    #[serde(default)]
    pub total_products: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionRecord {
    pub name: String,
    pub price: Decimal,
}

// =============================================================================
// Conversions
// =============================================================================

/// Convert a catalog record into a [`Product`].
///
/// Products without a usable image get a random local placeholder
/// (`snack-1.png` ..= `snack-{placeholders}.png`); with `placeholders == 0`
/// the image list stays empty.
pub(crate) fn convert_product(record: ProductRecord, placeholders: u32) -> Product {
    let mut images = record.images.map(clean_images).unwrap_or_default();
    if images.is_empty() && placeholders > 0 {
        images.push(placeholder_image(rand::rng().random_range(1..=placeholders)));
    }

    let flavor = record
        .flavor
        .unwrap_or_default()
        .into_iter()
        .filter(|f| !f.label.trim().is_empty())
        .map(|f| FlavorTag {
            color: f.color.unwrap_or_default(),
            label: f.label.trim().to_string(),
        })
        .collect();

    Product {
        id: ProductId::new(record.id),
        name: record.name.trim().to_string(),
        price: Price::from_amount(record.price),
        images,
        rating: record.rating.map_or_else(Rating::default, Rating::from_f64),
        description: record.description.unwrap_or_default(),
        flavor: dedupe_flavors(flavor),
        stock: record
            .stock
            .map_or(0, |s| u32::try_from(s.max(0)).unwrap_or(u32::MAX)),
        ingredients: record
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect(),
        category: record
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    }
}

pub(crate) fn convert_product_summary(record: ProductSummaryRecord) -> ProductSummary {
    ProductSummary {
        id: ProductId::new(record.id),
        name: record.name,
        price: Price::from_amount(record.price),
        category: record.category.filter(|c| !c.trim().is_empty()),
        description: record.description.unwrap_or_default(),
    }
}

/// Convert a successful analysis body into an [`AnalysisReport`].
pub(crate) fn convert_analysis(
    response: AnalyzeResponse,
    analysis: AnalysisRecord,
) -> AnalysisReport {
    let products: Vec<RecommendedProduct> = analysis
        .products
        .unwrap_or_default()
        .into_iter()
        .map(|p| RecommendedProduct {
            name: p.name,
            price: Price::from_amount(p.price),
        })
        .collect();

    let total_products = analysis
        .total_products
        .unwrap_or_else(|| u32::try_from(products.len()).unwrap_or(u32::MAX));

    AnalysisReport {
        filename: response.filename.unwrap_or_default(),
        file_size_bytes: response.file_size_bytes.unwrap_or_default(),
        transcription: response
            .transcription
            .filter(|t| !t.trim().is_empty()),
        description: analysis.description.unwrap_or_default(),
        recommended_category: analysis.recommended_category.trim().to_string(),
        products,
        total_products,
        message: response.message.unwrap_or_default(),
    }
}

/// Local placeholder image path.
pub(crate) fn placeholder_image(n: u32) -> String {
    format!("/static/images/products/snack-{n}.png")
}

/// Normalize an image list into clean, non-empty URLs.
fn clean_images(list: ImageList) -> Vec<String> {
    let raw = match list {
        ImageList::Many(items) => items,
        ImageList::One(s) => split_encoded_list(&s),
    };

    raw.iter()
        .flat_map(|item| split_encoded_list(item))
        .map(|s| clean_image_url(&s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Decode a string that may itself be a JSON array (`["a.png","b.png"]`),
/// optionally wrapped in single quotes.
fn split_encoded_list(value: &str) -> Vec<String> {
    let trimmed = value.trim().trim_matches('\'').trim();
    if trimmed.starts_with('[')
        && let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed)
    {
        return items;
    }
    vec![value.to_string()]
}

/// Strip stray quoting and bracket characters around a single URL.
fn clean_image_url(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '\'' | '"' | '[' | ']') || c.is_whitespace())
        .to_string()
}
