//! Core types for the nutrition kiosk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod analysis;
pub mod capture;
pub mod category;
pub mod id;
pub mod price;
pub mod product;

pub use analysis::{AnalysisReport, RecommendedProduct};
pub use capture::{CaptureKind, CapturedMedia, UnknownCaptureKind};
pub use category::{DialPosition, DialSlot, SelectorCategory, dial_layout};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use product::{FlavorTag, MAX_RATING, Product, Rating, dedupe_flavors};
