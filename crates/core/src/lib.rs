//! Nutrition Kiosk Core - Shared types library.
//!
//! This crate provides the domain types used by the kiosk server and its
//! tests:
//! - catalog products, prices and ids
//! - the shopping [`Cart`](cart::Cart)
//! - capture kinds, payloads and analysis results
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no async runtime. Observable wrappers and the capture workflow
//! live in the `nutrition-kiosk` crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers and domain records
//! - [`cart`] - Cart with merge-by-id semantics and derived totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartItem};
pub use types::*;
