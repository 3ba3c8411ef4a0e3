//! Catalog product types.
//!
//! Products are immutable snapshots of the remote catalog. The kiosk never
//! edits them; the cart stores its own copy alongside a quantity.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// Highest rating a product can carry.
pub const MAX_RATING: u8 = 5;

/// A purchasable product from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Image URLs in display order. The first one is the hero image.
    pub images: Vec<String>,
    pub rating: Rating,
    pub description: String,
    pub flavor: Vec<FlavorTag>,
    pub stock: u32,
    pub ingredients: Vec<String>,
    pub category: Option<String>,
}

impl Product {
    /// Hero image URL, if the product has any image.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether at least one unit can be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether the product belongs to `category`.
    ///
    /// Matching ignores surrounding whitespace and ASCII case, since the
    /// recommended category comes from a different service than the catalog.
    #[must_use]
    pub fn matches_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|own| own.trim().eq_ignore_ascii_case(category.trim()))
    }

    /// Clamp a requested quantity to what can actually be sold (`1..=stock`).
    ///
    /// Returns `None` when the product is out of stock.
    #[must_use]
    pub fn clamp_quantity(&self, requested: u32) -> Option<u32> {
        self.in_stock().then(|| requested.clamp(1, self.stock))
    }
}

/// A colored flavor label shown on the product detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlavorTag {
    pub color: String,
    pub label: String,
}

/// Star rating between 0 and [`MAX_RATING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    /// Create a rating, clamping values above [`MAX_RATING`].
    #[must_use]
    pub const fn new(stars: u8) -> Self {
        if stars > MAX_RATING {
            Self(MAX_RATING)
        } else {
            Self(stars)
        }
    }

    /// Create a rating from a loosely typed upstream value.
    ///
    /// Fractions are rounded, negatives and NaN become 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() || value <= 0.0 {
            return Self(0);
        }
        // Clamped to 0..=5 before the cast, so truncation cannot occur
        Self(value.round().min(f64::from(MAX_RATING)) as u8)
    }

    /// Number of filled stars.
    #[must_use]
    pub const fn stars(&self) -> u8 {
        self.0
    }

    /// Filled/empty flags for each of the five stars, for templates.
    #[must_use]
    pub fn star_flags(&self) -> Vec<bool> {
        (0..MAX_RATING).map(|i| i < self.0).collect()
    }
}

/// Remove duplicate flavor tags by label, keeping the first occurrence.
#[must_use]
pub fn dedupe_flavors(tags: Vec<FlavorTag>) -> Vec<FlavorTag> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.label.trim().to_lowercase()))
        .collect()
}
