//! Observable cart store.
//!
//! A single [`CartStore`] is shared by every page of the kiosk. Each mutation
//! is applied atomically to the current [`Cart`] and subscribers are woken
//! only when the contents actually changed.

use nutrition_kiosk_core::{Cart, CartItem, Price, Product, ProductId};
use tokio::sync::watch;

/// Shared, observable cart.
#[derive(Debug)]
pub struct CartStore {
    tx: watch::Sender<Cart>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Cart::new());
        Self { tx }
    }

    /// Clone of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.tx.borrow().clone()
    }

    /// Receive the cart after every effective change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.tx.subscribe()
    }

    /// Add `quantity` units of `product`, merging with an existing line.
    pub fn add_item(&self, product: Product, quantity: u32) -> bool {
        let id = product.id;
        let changed = self.tx.send_if_modified(|cart| cart.add_item(product, quantity));
        if changed {
            tracing::info!(product_id = %id, quantity, "Added to cart");
        }
        changed
    }

    /// Add up to `requested` units of `product` without the line going over
    /// the product's stock.
    ///
    /// Returns how many units were added: zero when the product is out of
    /// stock or the cart already holds all of it.
    pub fn add_within_stock(&self, product: Product, requested: u32) -> u32 {
        let id = product.id;
        let mut added = 0;
        self.tx.send_if_modified(|cart| {
            let held = cart.get(id).map_or(0, CartItem::quantity);
            added = requested.min(product.stock.saturating_sub(held));
            cart.add_item(product, added)
        });
        if added > 0 {
            tracing::info!(product_id = %id, quantity = added, requested, "Added to cart");
        }
        added
    }

    /// Set the quantity of a line; zero or less removes it.
    pub fn update_quantity(&self, id: ProductId, quantity: i64) -> bool {
        let changed = self
            .tx
            .send_if_modified(|cart| cart.update_quantity(id, quantity));
        if changed {
            tracing::info!(product_id = %id, quantity, "Updated cart quantity");
        }
        changed
    }

    /// Remove a line.
    pub fn remove_item(&self, id: ProductId) -> bool {
        let changed = self.tx.send_if_modified(|cart| cart.remove_item(id));
        if changed {
            tracing::info!(product_id = %id, "Removed from cart");
        }
        changed
    }

    /// Empty the cart.
    pub fn clear(&self) -> bool {
        let changed = self.tx.send_if_modified(Cart::clear);
        if changed {
            tracing::info!("Cleared cart");
        }
        changed
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.tx.borrow().total_items()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.tx.borrow().total_price()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use nutrition_kiosk_core::Rating;
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Snack {id}"),
            price: Price::from_amount(Decimal::from_str(price).unwrap()),
            images: Vec::new(),
            rating: Rating::new(3),
            description: String::new(),
            flavor: Vec::new(),
            stock: 5,
            ingredients: Vec::new(),
            category: None,
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = CartStore::new();
        let mut rx = store.subscribe();

        assert!(store.add_item(product(1, "4.99"), 2));
        rx.changed().await.unwrap();
        let cart = rx.borrow_and_update().clone();
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_price().display(), "$9.98");
    }

    #[test]
    fn test_no_op_does_not_notify() {
        let store = CartStore::new();
        let mut rx = store.subscribe();

        assert!(!store.remove_item(ProductId::new(9)));
        assert!(!store.clear());
        assert!(!store.add_item(product(1, "1.00"), 0));
        assert!(!rx.has_changed().unwrap());

        store.add_item(product(1, "1.00"), 1);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!store.update_quantity(ProductId::new(1), 1));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let store = CartStore::new();
        store.add_item(product(1, "2.50"), 3);
        store.add_item(product(2, "1.00"), 1);

        assert!(store.update_quantity(ProductId::new(1), 0));
        let cart = store.snapshot();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(store.total_items(), 1);
        assert_eq!(store.total_price().display(), "$1.00");

        assert!(store.update_quantity(ProductId::new(2), -3));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_add_within_stock_caps_merged_line() {
        let store = CartStore::new();
        let mut rx = store.subscribe();

        // Stock is 5
        assert_eq!(store.add_within_stock(product(1, "1.00"), 5), 5);
        assert_eq!(store.add_within_stock(product(1, "1.00"), 5), 0);
        assert_eq!(store.total_items(), 5);
        rx.borrow_and_update();

        assert_eq!(store.add_within_stock(product(1, "1.00"), 1), 0);
        assert!(!rx.has_changed().unwrap());

        store.update_quantity(ProductId::new(1), 3);
        assert_eq!(store.add_within_stock(product(1, "1.00"), 4), 2);
        assert_eq!(store.total_items(), 5);

        let mut sold_out = product(2, "1.00");
        sold_out.stock = 0;
        assert_eq!(store.add_within_stock(sold_out, 1), 0);
        assert_eq!(store.snapshot().items().len(), 1);
    }

    #[test]
    fn test_concurrent_adds_within_stock_never_oversell() {
        let store = Arc::new(CartStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| store.add_within_stock(product(1, "0.10"), 1))
                        .sum::<u32>()
                })
            })
            .collect();
        let added: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(added, 5);
        assert_eq!(store.total_items(), 5);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let store = Arc::new(CartStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.add_item(product(1, "0.10"), 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.total_items(), 800);
        assert_eq!(store.snapshot().items().len(), 1);
        assert_eq!(store.total_price().display(), "$80.00");
    }
}
