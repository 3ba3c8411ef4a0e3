//! Cart and checkout route handlers.
//!
//! The kiosk has exactly one cart, held in [`crate::services::CartStore`].
//! Mutations are plain form posts that redirect back to a page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use nutrition_kiosk_core::{Cart, CartItem, Price, ProductId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::state::AppState;

/// Where cart mutations land unless the form says otherwise.
const DEFAULT_REDIRECT: &str = "/checkout";

/// Checkout line display data for templates.
#[derive(Clone)]
pub struct CheckoutLineView {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
    pub max_quantity: u32,
}

impl From<&CartItem> for CheckoutLineView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.product.id,
            name: item.product.name.clone(),
            image: item.product.primary_image().map(str::to_string),
            unit_price: item.product.price.display(),
            quantity: item.quantity(),
            line_total: item.line_total().display(),
            max_quantity: item.product.stock.max(item.quantity()),
        }
    }
}

/// Checkout summary display data.
#[derive(Clone)]
pub struct CheckoutView {
    pub lines: Vec<CheckoutLineView>,
    pub item_count: u64,
    pub subtotal: String,
    pub discount: String,
    pub coupons: String,
    pub total: String,
}

impl From<&Cart> for CheckoutView {
    fn from(cart: &Cart) -> Self {
        let subtotal = cart.total_price();
        let zero = Price::zero(subtotal.currency_code).display();
        Self {
            lines: cart.items().iter().map(CheckoutLineView::from).collect(),
            item_count: cart.total_items(),
            subtotal: subtotal.display(),
            discount: zero.clone(),
            coupons: zero,
            total: subtotal.display(),
        }
    }
}

impl CheckoutView {
    /// Payment is only offered for a non-empty cart.
    #[must_use]
    pub fn can_pay(&self) -> bool {
        !self.lines.is_empty()
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<u32>,
    pub redirect: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub checkout: CheckoutView,
    pub cart_count: u64,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u64,
}

/// Add a product to the cart.
///
/// The product is re-read from the catalog so the line, including what is
/// already in the cart, never exceeds the current stock. Out-of-stock
/// products and adds with no stock left are refused.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Form(form): Form<AddToCartForm>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(form.product_id);
    let product = state
        .catalog()
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    if !product.in_stock() {
        return Err(AppError::BadRequest(format!("{} is out of stock", product.name)));
    }

    let name = product.name.clone();
    let requested = form.quantity.unwrap_or(1).max(1);
    if state.cart().add_within_stock(product, requested) == 0 {
        return Err(AppError::BadRequest(format!(
            "All available {name} are already in the cart"
        )));
    }
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &id.to_string())]));

    Ok(Redirect::to(safe_redirect(form.redirect.as_deref())))
}

/// Set the quantity of a cart line; zero or less removes it.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    Form(form): Form<UpdateCartForm>,
) -> impl IntoResponse {
    state
        .cart()
        .update_quantity(ProductId::new(form.product_id), form.quantity);
    Redirect::to(DEFAULT_REDIRECT)
}

/// Remove a cart line.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Form(form): Form<RemoveFromCartForm>,
) -> impl IntoResponse {
    state.cart().remove_item(ProductId::new(form.product_id));
    Redirect::to(DEFAULT_REDIRECT)
}

/// Get cart count badge.
pub async fn count(State(state): State<AppState>) -> impl IntoResponse {
    CartCountTemplate {
        count: state.cart().total_items(),
    }
}

/// Display the checkout summary.
#[instrument(skip(state))]
pub async fn checkout(State(state): State<AppState>) -> impl IntoResponse {
    let cart = state.cart().snapshot();
    CheckoutTemplate {
        checkout: CheckoutView::from(&cart),
        cart_count: cart.total_items(),
    }
}

/// Finish the order and reset the cart for the next customer.
#[instrument(skip(state))]
pub async fn complete(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let cart = state.cart().snapshot();
    if cart.is_empty() {
        return Err(AppError::BadRequest("The cart is empty".to_string()));
    }

    tracing::info!(
        items = cart.total_items(),
        total = %cart.total_price(),
        "Checkout completed"
    );
    state.cart().clear();
    Ok(Redirect::to("/"))
}

/// Only same-site paths are accepted as redirect targets.
fn safe_redirect(target: Option<&str>) -> &str {
    match target.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => DEFAULT_REDIRECT,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use nutrition_kiosk_core::{Product, Rating};
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Snack {id}"),
            price: Price::from_amount(Decimal::from_str(price).unwrap_or_default()),
            images: Vec::new(),
            rating: Rating::new(5),
            description: String::new(),
            flavor: Vec::new(),
            stock: 4,
            ingredients: Vec::new(),
            category: None,
        }
    }

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/products")), "/products");
        assert_eq!(safe_redirect(Some("//evil.example")), DEFAULT_REDIRECT);
        assert_eq!(safe_redirect(Some("https://evil.example")), DEFAULT_REDIRECT);
        assert_eq!(safe_redirect(None), DEFAULT_REDIRECT);
    }

    #[test]
    fn test_checkout_view_totals() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "4.99"), 2);
        cart.add_item(product(2, "1.25"), 1);

        let view = CheckoutView::from(&cart);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.total, "$11.23");
        assert_eq!(view.discount, "$0.00");
        assert_eq!(view.coupons, "$0.00");
        assert_eq!(view.lines[0].line_total, "$9.98");
        assert!(view.can_pay());
    }

    #[test]
    fn test_empty_checkout_cannot_pay() {
        let view = CheckoutView::from(&Cart::new());
        assert!(!view.can_pay());
        assert_eq!(view.total, "$0.00");
    }
}
