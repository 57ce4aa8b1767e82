//! Serializable cart state with pure reducer-style mutations.
//!
//! The cart is an explicit value owned by one client session. Every mutation
//! is a pure function returning the next state, so any storefront (or test)
//! can replay a sequence of operations without depending on a store
//! framework. The serialized shape doubles as the checkout payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product entry in a cart. Lines are unique per product; quantities
/// merge on add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart state. Line order is insertion order, which keeps rendering stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> i32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Adds `quantity` units of a product, merging with an existing line.
    /// Non-positive quantities leave the cart unchanged.
    #[must_use]
    pub fn add(&self, product_id: Uuid, quantity: i32) -> Cart {
        if quantity <= 0 {
            return self.clone();
        }

        let mut next = self.clone();
        match next.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => next.lines.push(CartLine {
                product_id,
                quantity,
            }),
        }
        next
    }

    /// Subtracts `quantity` units; a line that reaches zero is dropped.
    #[must_use]
    pub fn subtract(&self, product_id: Uuid, quantity: i32) -> Cart {
        if quantity <= 0 {
            return self.clone();
        }

        let mut next = self.clone();
        if let Some(line) = next.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity -= quantity;
        }
        next.lines.retain(|l| l.quantity > 0);
        next
    }

    /// Removes a product's line entirely.
    #[must_use]
    pub fn remove(&self, product_id: Uuid) -> Cart {
        let mut next = self.clone();
        next.lines.retain(|l| l.product_id != product_id);
        next
    }

    /// Empties the cart.
    #[must_use]
    pub fn clear(&self) -> Cart {
        Cart::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn add_merges_lines_for_the_same_product() {
        let cart = Cart::new().add(pid(1), 2).add(pid(1), 3);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn add_keeps_insertion_order() {
        let cart = Cart::new().add(pid(1), 1).add(pid(2), 1).add(pid(1), 1);
        let ids: Vec<_> = cart.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![pid(1), pid(2)]);
    }

    #[test]
    fn subtract_drops_a_line_at_zero() {
        let cart = Cart::new().add(pid(1), 2).subtract(pid(1), 2);
        assert!(cart.is_empty());
    }

    #[test]
    fn subtract_below_zero_does_not_go_negative() {
        let cart = Cart::new().add(pid(1), 1).subtract(pid(1), 5);
        assert!(cart.is_empty());
    }

    #[test]
    fn reducers_do_not_mutate_the_input() {
        let original = Cart::new().add(pid(1), 2);
        let _ = original.subtract(pid(1), 1);
        let _ = original.remove(pid(1));
        let _ = original.clear();
        assert_eq!(original.unit_count(), 2);
    }

    #[test]
    fn non_positive_quantities_are_ignored() {
        let cart = Cart::new().add(pid(1), 0).add(pid(2), -3);
        assert!(cart.is_empty());
    }

    #[test]
    fn clear_empties_everything() {
        let cart = Cart::new().add(pid(1), 2).add(pid(2), 1).clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn cart_round_trips_through_json() {
        let cart = Cart::new().add(pid(1), 2);
        let json = serde_json::to_string(&cart).unwrap();
        let back: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(cart, back);
    }
}
