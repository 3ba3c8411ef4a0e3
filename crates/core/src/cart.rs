//! Shopping cart data structure.
//!
//! [`Cart`] keeps at most one [`CartItem`] per product id, in the order the
//! products were first added, and never holds an item with quantity zero.
//! Every mutator reports whether it changed anything so an observable
//! wrapper can skip notifying subscribers on no-ops.

use serde::{Deserialize, Serialize};

use crate::types::{Price, Product, ProductId};

/// A product in the cart together with its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    quantity: u32,
}

impl CartItem {
    /// Quantity of this product in the cart (always at least 1).
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// The kiosk shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Look up the item for a product.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product.id == id)
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` units of `product`.
    ///
    /// Increments the existing entry if the product is already in the cart.
    /// A quantity of zero is a no-op. Returns whether the cart changed.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product.id == product.id) {
            item.quantity = item.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem { product, quantity });
        }
        true
    }

    /// Set the quantity for a product.
    ///
    /// A quantity of zero or less removes the item. Unknown ids are a no-op.
    /// Returns whether the cart changed.
    pub fn update_quantity(&mut self, id: ProductId, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            // Negative values remove; values beyond u32 saturate
            return if quantity < 0 {
                self.remove_item(id)
            } else {
                self.set_quantity(id, u32::MAX)
            };
        };

        if quantity == 0 {
            self.remove_item(id)
        } else {
            self.set_quantity(id, quantity)
        }
    }

    fn set_quantity(&mut self, id: ProductId, quantity: u32) -> bool {
        match self.items.iter_mut().find(|i| i.product.id == id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove a product from the cart. Returns whether it was present.
    pub fn remove_item(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product.id != id);
        self.items.len() != before
    }

    /// Empty the cart. Returns whether it had any items.
    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of price times quantity over all items.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::types::product::fixtures::product;

    fn price(s: &str) -> Price {
        Price::from_amount(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_adding_same_product_twice_merges() {
        let mut cart = Cart::new();
        assert!(cart.add_item(product(1, "4.99"), 1));
        assert!(cart.add_item(product(1, "4.99"), 1));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity(), 2);
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_price(), price("9.98"));
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut cart = Cart::new();
        assert!(!cart.add_item(product(1, "4.99"), 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "4.99"), 3);
        assert!(cart.update_quantity(ProductId::new(1), 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_negative_removes() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "4.99"), 3);
        assert!(cart.update_quantity(ProductId::new(1), -2));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "4.99"), 1);
        let before = cart.clone();

        assert!(!cart.update_quantity(ProductId::new(99), 5));
        assert!(!cart.update_quantity(ProductId::new(99), 0));
        assert!(!cart.remove_item(ProductId::new(99)));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_update_same_quantity_reports_unchanged() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "4.99"), 2);
        assert!(!cart.update_quantity(ProductId::new(1), 2));
        assert!(cart.update_quantity(ProductId::new(1), 5));
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn test_remove_item() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "1.00"), 1);
        cart.add_item(product(2, "2.00"), 4);
        assert!(cart.remove_item(ProductId::new(1)));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_price(), price("8.00"));
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut cart = Cart::new();
        cart.add_item(product(3, "1.00"), 1);
        cart.add_item(product(1, "1.00"), 1);
        cart.add_item(product(3, "1.00"), 1);
        let ids: Vec<i32> = cart.items().iter().map(|i| i.product.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        assert!(!cart.clear());
        cart.add_item(product(1, "1.00"), 1);
        assert!(cart.clear());
        assert_eq!(cart.total_price(), Price::default());
    }

    #[test]
    fn test_quantity_saturates() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "1.00"), u32::MAX);
        cart.add_item(product(1, "1.00"), 5);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity(), u32::MAX);
        cart.update_quantity(ProductId::new(1), i64::MAX);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity(), u32::MAX);
    }

    /// Deterministic pseudo-random op sequence; the invariants must hold after each step.
    #[test]
    fn test_invariants_hold_for_mixed_operation_sequences() {
        let mut cart = Cart::new();
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..2_000 {
            let id = i32::try_from(next() % 6).unwrap();
            let qty = i64::try_from(next() % 7).unwrap() - 2;
            match next() % 3 {
                0 => {
                    cart.add_item(product(id, "0.50"), u32::try_from(qty.max(0)).unwrap());
                }
                1 => {
                    cart.update_quantity(ProductId::new(id), qty);
                }
                _ => {
                    cart.remove_item(ProductId::new(id));
                }
            }

            let ids: HashSet<_> = cart.items().iter().map(|i| i.product.id).collect();
            assert_eq!(ids.len(), cart.items().len(), "duplicate product ids");
            assert!(cart.items().iter().all(|i| i.quantity() >= 1));
            let sum: u64 = cart.items().iter().map(|i| u64::from(i.quantity())).sum();
            assert_eq!(cart.total_items(), sum);
            assert_eq!(
                cart.total_price().amount,
                Decimal::from(sum) * Decimal::from_str("0.50").unwrap()
            );
        }
    }
}
