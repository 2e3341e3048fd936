//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::{Money, Quantity, Sku, SkuError};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: Sku,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub price: Money,
    /// MRP printed on the pack, shown struck through when above `price`.
    pub compare_at_price: Option<Money>,
    pub stock: Quantity,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub benefits: Vec<String>,
    pub ingredients: Vec<String>,
    pub weight_grams: u32,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

/// Admin input for creating or replacing a product.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(length(min = 2, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    #[validate(length(max = 12))]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub weight_grams: u32,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub publish: bool,
}

impl ProductDraft {
    fn check_prices(&self) -> Result<(), ProductError> {
        if self.price <= Decimal::ZERO { return Err(ProductError::InvalidPrice); }
        if matches!(self.compare_at_price, Some(mrp) if mrp < self.price) {
            return Err(ProductError::MrpBelowPrice);
        }
        Ok(())
    }
}

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, ProductError> {
        draft.check_prices()?;
        let sku = Sku::new(draft.sku.as_str())?;
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut product = Self {
            id, sku: sku.clone(), slug: slugify(&draft.name), name: draft.name.trim().to_string(),
            description: draft.description, category: draft.category.trim().to_string(),
            price: Money::inr(draft.price), compare_at_price: draft.compare_at_price.map(Money::inr),
            stock: Quantity::new(draft.stock), images: draft.images, tags: draft.tags,
            benefits: draft.benefits, ingredients: draft.ingredients, weight_grams: draft.weight_grams,
            status: ProductStatus::Draft, is_featured: draft.is_featured,
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku: sku.to_string() }));
        if draft.publish { product.publish()?; }
        Ok(product)
    }

    /// Rebuilds a product loaded from storage; raises no events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, sku: Sku, name: String, slug: String, description: String, category: String,
        price: Money, compare_at_price: Option<Money>, stock: Quantity, images: Vec<String>,
        tags: Vec<String>, benefits: Vec<String>, ingredients: Vec<String>, weight_grams: u32,
        status: ProductStatus, is_featured: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id, sku, name, slug, description, category, price, compare_at_price, stock, images, tags,
            benefits, ingredients, weight_grams, status, is_featured, created_at, updated_at, events: vec![],
        }
    }

    /// Replaces the editable fields. The slug follows the name.
    pub fn apply_draft(&mut self, draft: ProductDraft) -> Result<(), ProductError> {
        draft.check_prices()?;
        self.sku = Sku::new(draft.sku.as_str())?;
        self.slug = slugify(&draft.name);
        self.name = draft.name.trim().to_string();
        self.description = draft.description;
        self.category = draft.category.trim().to_string();
        self.price = Money::inr(draft.price);
        self.compare_at_price = draft.compare_at_price.map(Money::inr);
        self.stock = Quantity::new(draft.stock);
        self.images = draft.images;
        self.tags = draft.tags;
        self.benefits = draft.benefits;
        self.ingredients = draft.ingredients;
        self.weight_grams = draft.weight_grams;
        self.is_featured = draft.is_featured;
        if draft.publish && self.status != ProductStatus::Active { self.publish()?; }
        if !draft.publish && self.status == ProductStatus::Active { self.status = ProductStatus::Draft; }
        self.touch();
        Ok(())
    }

    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active && self.is_in_stock() }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// URL slug: lowercase ASCII words joined by single dashes.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Price must be greater than zero")]
    InvalidPrice,
    #[error("MRP cannot be lower than the selling price")]
    MrpBelowPrice,
    #[error(transparent)]
    Sku(#[from] SkuError),
    #[error("Unknown product status: {0}")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            sku: "ashwa-60".into(), name: "Ashwagandha Churna (100g)".into(), description: String::new(),
            category: "Churna".into(), price: Decimal::new(299, 0), compare_at_price: Some(Decimal::new(399, 0)),
            stock: 0, images: vec![], tags: vec![], benefits: vec![], ingredients: vec![], weight_grams: 100,
            is_featured: false, publish: false,
        }
    }

    #[test]
    fn test_product_create() {
        let mut p = Product::create(draft()).unwrap();
        assert_eq!(p.name, "Ashwagandha Churna (100g)");
        assert_eq!(p.slug, "ashwagandha-churna-100g");
        assert_eq!(p.sku.as_str(), "ASHWA-60");
        assert_eq!(p.status, ProductStatus::Draft);
        assert_eq!(p.take_events().len(), 1);
    }

    #[test]
    fn test_create_published() {
        let p = Product::create(ProductDraft { publish: true, ..draft() }).unwrap();
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_rejects_bad_prices() {
        let err = Product::create(ProductDraft { price: Decimal::ZERO, ..draft() }).unwrap_err();
        assert_eq!(err, ProductError::InvalidPrice);
        let err = Product::create(ProductDraft { compare_at_price: Some(Decimal::new(100, 0)), ..draft() }).unwrap_err();
        assert_eq!(err, ProductError::MrpBelowPrice);
    }

    #[test]
    fn test_purchasable_needs_stock_and_active() {
        let mut p = Product::create(ProductDraft { publish: true, ..draft() }).unwrap();
        assert!(!p.is_purchasable());
        p.apply_draft(ProductDraft { stock: 10, publish: true, ..draft() }).unwrap();
        assert!(p.is_purchasable());
        p.archive();
        assert!(!p.is_purchasable());
        assert_eq!(p.take_events().len(), 3);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Triphala -- Tablets!! "), "triphala-tablets");
    }
}
