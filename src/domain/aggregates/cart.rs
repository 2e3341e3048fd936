//! Cart Aggregate
//!
//! The storefront keeps the cart client-side; the server rebuilds it from the
//! catalog on every quote and checkout so prices and stock are authoritative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::order::LineItem;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Money, STORE_CURRENCY};

#[derive(Clone, Debug)]
pub struct Cart {
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
}

#[derive(Clone, Debug)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }

    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            product_id: self.product_id, name: self.name.clone(), sku: self.sku.clone(),
            image: self.image.clone(), quantity: self.quantity,
            unit_price: self.unit_price.amount(), total: self.line_total().amount(),
        }
    }
}

/// Most units of one product a single order may carry.
pub const MAX_LINE_QUANTITY: u32 = 1000;

/// A product and quantity as the shopper submitted them.
#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct CartLine {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
}

/// Shipping fee policy applied at checkout.
#[derive(Clone, Debug)]
pub struct PricingRules {
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_fee: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self { free_shipping_threshold: Decimal::new(499, 0), flat_shipping_fee: Decimal::new(50, 0) }
    }
}

/// Priced cart returned by quote and used to place orders.
#[derive(Clone, Debug, Serialize)]
pub struct Quote {
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { items: vec![], subtotal: Money::zero(currency), currency: currency.to_string() }
    }

    /// Builds a cart from requested lines, resolving each against `catalog`.
    pub fn from_catalog(catalog: &[Product], lines: &[CartLine]) -> Result<Self, CartError> {
        if lines.is_empty() { return Err(CartError::Empty); }
        let mut cart = Self::new(STORE_CURRENCY);
        for line in lines {
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(CartError::InvalidQuantity(line.product_id));
            }
            let product = catalog.iter().find(|p| p.id == line.product_id)
                .ok_or(CartError::ProductUnavailable(line.product_id))?;
            if !product.is_purchasable() { return Err(CartError::ProductUnavailable(product.id)); }
            cart.add_item(CartItem {
                product_id: product.id, name: product.name.clone(), sku: product.sku.to_string(),
                image: product.images.first().cloned(), quantity: line.quantity, unit_price: product.price.clone(),
            })?;
        }
        for item in &cart.items {
            let stock = catalog.iter().find(|p| p.id == item.product_id).map_or(0, |p| p.stock.value());
            if item.quantity > stock {
                return Err(CartError::InsufficientStock { product: item.name.clone(), available: stock });
            }
        }
        Ok(cart)
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds `item`, merging it into an existing line for the same product.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing
                .quantity
                .checked_add(item.quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or(CartError::InvalidQuantity(item.product_id))?;
        } else {
            self.items.push(item);
        }
        self.recalculate();
        Ok(())
    }

    /// Prices the cart after `discount`. Shipping is waived once the
    /// discounted subtotal reaches the free-shipping threshold.
    pub fn quote(&self, discount: &Money, rules: &PricingRules) -> Quote {
        let discount = discount.min(&self.subtotal);
        let discounted = self.subtotal.saturating_sub(&discount).unwrap_or_else(|_| self.subtotal.clone());
        let shipping = if self.is_empty() || discounted.amount() >= rules.free_shipping_threshold {
            Money::zero(&self.currency)
        } else {
            Money::new(rules.flat_shipping_fee, &self.currency)
        };
        let total = discounted.add(&shipping).unwrap_or(discounted).rounded();
        Quote {
            items: self.items.iter().map(CartItem::to_line_item).collect(),
            subtotal: self.subtotal.amount(),
            discount: discount.amount(),
            shipping_fee: shipping.amount(),
            total: total.amount(),
            currency: self.currency.clone(),
        }
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Cart is empty")]
    Empty,
    #[error("Quantity must be between 1 and 1000 for product {0}")]
    InvalidQuantity(Uuid),
    #[error("Product {0} is not available")]
    ProductUnavailable(Uuid),
    #[error("Only {available} left in stock for {product}")]
    InsufficientStock { product: String, available: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::ProductDraft;

    fn product(name: &str, price: i64, stock: u32) -> Product {
        Product::create(ProductDraft {
            sku: name.to_uppercase(), name: name.into(), description: String::new(), category: "Tailam".into(),
            price: Decimal::new(price, 0), compare_at_price: None, stock, images: vec![], tags: vec![],
            benefits: vec![], ingredients: vec![], weight_grams: 100, is_featured: false, publish: true,
        }).unwrap()
    }

    #[test]
    fn test_cart_operations() {
        let oil = product("Bhringraj Oil", 10, 10);
        let mut cart = Cart::from_catalog(std::slice::from_ref(&oil), &[CartLine { product_id: oil.id, quantity: 2 }]).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(20, 0));
        cart.add_item(CartItem { product_id: oil.id, name: oil.name.clone(), sku: "X".into(), image: None, quantity: 1, unit_price: oil.price.clone() }).unwrap();
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.subtotal().amount(), Decimal::new(30, 0));
    }

    #[test]
    fn test_duplicate_lines_checked_against_stock() {
        let oil = product("Bhringraj Oil", 10, 3);
        let lines = [CartLine { product_id: oil.id, quantity: 2 }, CartLine { product_id: oil.id, quantity: 2 }];
        let err = Cart::from_catalog(&[oil], &lines).unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { available: 3, .. }));
    }

    #[test]
    fn test_merged_quantity_overflow_is_rejected() {
        let oil = product("Bhringraj Oil", 10, 3);
        let lines = [CartLine { product_id: oil.id, quantity: 1 }, CartLine { product_id: oil.id, quantity: u32::MAX }];
        assert_eq!(Cart::from_catalog(std::slice::from_ref(&oil), &lines).unwrap_err(), CartError::InvalidQuantity(oil.id));

        let lines = [CartLine { product_id: oil.id, quantity: 600 }, CartLine { product_id: oil.id, quantity: 600 }];
        assert_eq!(Cart::from_catalog(std::slice::from_ref(&oil), &lines).unwrap_err(), CartError::InvalidQuantity(oil.id));
    }

    #[test]
    fn test_line_quantity_range() {
        let line = CartLine { product_id: Uuid::now_v7(), quantity: MAX_LINE_QUANTITY + 1 };
        assert!(line.validate().is_err());
        assert!(CartLine { quantity: 2, ..line }.validate().is_ok());
    }

    #[test]
    fn test_unknown_and_zero_lines() {
        let oil = product("Bhringraj Oil", 10, 3);
        let missing = Uuid::now_v7();
        assert_eq!(Cart::from_catalog(&[oil.clone()], &[CartLine { product_id: missing, quantity: 1 }]).unwrap_err(), CartError::ProductUnavailable(missing));
        assert_eq!(Cart::from_catalog(&[oil.clone()], &[CartLine { product_id: oil.id, quantity: 0 }]).unwrap_err(), CartError::InvalidQuantity(oil.id));
        assert_eq!(Cart::from_catalog(&[oil], &[]).unwrap_err(), CartError::Empty);
    }

    #[test]
    fn test_quote_shipping_threshold() {
        let chyawanprash = product("Chyawanprash", 450, 10);
        let cart = Cart::from_catalog(std::slice::from_ref(&chyawanprash), &[CartLine { product_id: chyawanprash.id, quantity: 1 }]).unwrap();
        let rules = PricingRules::default();

        let q = cart.quote(&Money::zero(STORE_CURRENCY), &rules);
        assert_eq!(q.shipping_fee, Decimal::new(50, 0));
        assert_eq!(q.total, Decimal::new(500, 0));

        let cart = Cart::from_catalog(std::slice::from_ref(&chyawanprash), &[CartLine { product_id: chyawanprash.id, quantity: 2 }]).unwrap();
        let q = cart.quote(&Money::inr(Decimal::new(100, 0)), &rules);
        assert_eq!(q.subtotal, Decimal::new(900, 0));
        assert_eq!(q.discount, Decimal::new(100, 0));
        assert_eq!(q.shipping_fee, Decimal::ZERO);
        assert_eq!(q.total, Decimal::new(800, 0));
    }
}
