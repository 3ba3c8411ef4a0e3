//! HTTP route handlers for the kiosk.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Home page
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (catalog reachable)
//!
//! # AI selector
//! GET  /ai-selector              - Category dial and capture panel (?active=)
//! POST /ai-selector/open         - Page reports getUserMedia outcome, opens the device
//! POST /ai-selector/capture      - Multipart capture upload, analyzed before responding
//! POST /ai-selector/retry        - Re-acquire the device after a result
//! POST /ai-selector/close        - Release the device, back to idle
//! GET  /ai-selector/status       - Workflow status (JSON)
//!
//! # Catalog
//! GET  /products                 - Product listing (?category=)
//! GET  /product-detail/{id}      - Product detail (?quantity=&confirm=)
//!
//! # Cart
//! POST /cart/add                 - Add to cart, then redirect
//! POST /cart/update              - Set line quantity
//! POST /cart/remove              - Remove line
//! GET  /cart/count               - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout                 - Order summary and payment QR
//! POST /checkout/complete        - Finish and clear the cart
//!
//! # API
//! GET  /api/product/{id}         - Remote product lookup (JSON)
//! ```

pub mod ai_selector;
pub mod api;
pub mod cart;
pub mod home;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the AI selector routes router.
pub fn ai_selector_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(ai_selector::show))
        .route("/open", post(ai_selector::open))
        .route("/capture", post(ai_selector::capture))
        .route("/retry", post(ai_selector::retry))
        .route("/close", post(ai_selector::close))
        .route("/status", get(ai_selector::status))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::checkout))
        .route("/complete", post(cart::complete))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/product/{id}", get(api::product))
}

/// Create all routes for the kiosk.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/ai-selector", ai_selector_routes())
        .route("/products", get(products::index))
        .route("/product-detail/{id}", get(products::show))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/api", api_routes())
}
