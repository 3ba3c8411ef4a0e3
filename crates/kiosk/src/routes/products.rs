//! Product route handlers.
//!
//! Catalog failures are rendered on the page as an error panel with a retry
//! link. An empty catalog (or category) is not an error and gets its own
//! "no products" panel.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nutrition_kiosk_core::{FlavorTag, Product, ProductId};
use serde::Deserialize;
use tracing::instrument;

use crate::api::ProductListing;
use crate::filters;
use crate::state::AppState;

/// Message shown when the catalog cannot be read.
const CATALOG_UNAVAILABLE: &str = "We couldn't load the snacks right now. Please try again.";

/// Product card display data for the listing.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub image: Option<String>,
    pub stars: Vec<&'static str>,
    pub in_stock: bool,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price.display(),
            image: product.primary_image().map(str::to_string),
            stars: star_glyphs(product),
            in_stock: product.in_stock(),
        }
    }
}

/// Product detail display data.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub images: Vec<String>,
    pub stars: Vec<&'static str>,
    pub description: String,
    pub flavors: Vec<FlavorTag>,
    pub ingredients: Vec<String>,
    pub stock: u32,
    pub in_stock: bool,
}

impl From<&Product> for ProductDetailView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price.display(),
            images: product.images.clone(),
            stars: star_glyphs(product),
            description: product.description.clone(),
            flavors: product.flavor.clone(),
            ingredients: product.ingredients.clone(),
            stock: product.stock,
            in_stock: product.in_stock(),
        }
    }
}

/// Quantity picker state for the detail page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantityView {
    pub quantity: u32,
    pub decrement: u32,
    pub increment: u32,
}

impl QuantityView {
    fn for_product(product: &Product, requested: Option<u32>) -> Option<Self> {
        let quantity = product.clamp_quantity(requested.unwrap_or(1))?;
        Some(Self {
            quantity,
            decrement: quantity.saturating_sub(1).max(1),
            increment: quantity.saturating_add(1).min(product.stock),
        })
    }
}

/// Filled and empty stars for the product rating.
fn star_glyphs(product: &Product) -> Vec<&'static str> {
    product
        .rating
        .star_flags()
        .into_iter()
        .map(|filled| if filled { "★" } else { "☆" })
        .collect()
}

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
}

/// Detail query parameters.
#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub quantity: Option<u32>,
    #[serde(default)]
    pub confirm: bool,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products.html")]
pub struct ProductsTemplate {
    pub products: Vec<ProductCardView>,
    pub category: Option<String>,
    pub error: Option<String>,
    pub retry_href: String,
    pub cart_count: u64,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "product_detail.html")]
pub struct ProductDetailTemplate {
    pub product: Option<ProductDetailView>,
    pub quantity: Option<QuantityView>,
    pub line_total: String,
    pub confirm: bool,
    pub error: Option<String>,
    pub retry_href: String,
    pub cart_count: u64,
}

/// Display the product listing, optionally filtered by category.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Response {
    let category = query
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let retry_href = category.as_deref().map_or_else(
        || "/products".to_string(),
        |c| format!("/products?category={}", urlencoding::encode(c)),
    );
    let cart_count = state.cart().total_items();

    match state.catalog().listing(category.as_deref()).await {
        Ok(ProductListing::Products(products)) => ProductsTemplate {
            products: products.iter().map(ProductCardView::from).collect(),
            category,
            error: None,
            retry_href,
            cart_count,
        }
        .into_response(),
        Ok(ProductListing::Empty { category }) => ProductsTemplate {
            products: Vec::new(),
            category,
            error: None,
            retry_href,
            cart_count,
        }
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, status = ?e.status(), "Failed to load product listing");
            (
                StatusCode::BAD_GATEWAY,
                ProductsTemplate {
                    products: Vec::new(),
                    category,
                    error: Some(CATALOG_UNAVAILABLE.to_string()),
                    retry_href,
                    cart_count,
                },
            )
                .into_response()
        }
    }
}

/// Display one product with its quantity picker.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<DetailQuery>,
) -> Response {
    let id = ProductId::new(id);
    let retry_href = format!("/product-detail/{id}");
    let cart_count = state.cart().total_items();

    let error_page = |status: StatusCode, message: &str| {
        (
            status,
            ProductDetailTemplate {
                product: None,
                quantity: None,
                line_total: String::new(),
                confirm: false,
                error: Some(message.to_string()),
                retry_href: retry_href.clone(),
                cart_count,
            },
        )
            .into_response()
    };

    let product = match state.catalog().find_product(id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return error_page(StatusCode::NOT_FOUND, "This snack is no longer available.");
        }
        Err(e) => {
            tracing::error!(error = %e, status = ?e.status(), "Failed to load product");
            return error_page(StatusCode::BAD_GATEWAY, CATALOG_UNAVAILABLE);
        }
    };

    let quantity = QuantityView::for_product(&product, query.quantity);
    let line_total = quantity.map_or_else(
        || product.price.display(),
        |q| product.price.times(q.quantity).display(),
    );

    ProductDetailTemplate {
        product: Some(ProductDetailView::from(&product)),
        confirm: query.confirm && quantity.is_some(),
        quantity,
        line_total,
        error: None,
        retry_href,
        cart_count,
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nutrition_kiosk_core::{Price, Rating};

    use super::*;

    fn product(stock: u32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Trail Mix".to_string(),
            price: Price::from_cents(250),
            images: Vec::new(),
            rating: Rating::new(4),
            description: String::new(),
            flavor: Vec::new(),
            stock,
            ingredients: Vec::new(),
            category: None,
        }
    }

    #[test]
    fn test_quantity_clamped_to_stock() {
        let view = QuantityView::for_product(&product(3), Some(10)).unwrap();
        assert_eq!(view.quantity, 3);
        assert_eq!(view.increment, 3);
        assert_eq!(view.decrement, 2);
    }

    #[test]
    fn test_quantity_never_below_one() {
        let view = QuantityView::for_product(&product(5), Some(0)).unwrap();
        assert_eq!(view.quantity, 1);
        assert_eq!(view.decrement, 1);
        assert_eq!(view.increment, 2);
    }

    #[test]
    fn test_star_glyphs() {
        assert_eq!(star_glyphs(&product(1)), vec!["★", "★", "★", "★", "☆"]);
    }

    #[test]
    fn test_out_of_stock_has_no_picker() {
        assert!(QuantityView::for_product(&product(0), Some(1)).is_none());
    }
}
