//! Kiosk services.
//!
//! - `cart` - Process-wide observable cart

pub mod cart;

pub use cart::CartStore;
