//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{conflict_or, page_offset, RepositoryError};
use crate::domain::aggregates::{Product, ProductStatus};
use crate::domain::value_objects::{Money, Quantity, Sku};

const PRODUCT_COLUMNS: &str = "id, sku, name, slug, description, category, price, compare_at_price, stock, images, \
     tags, benefits, ingredients, weight_grams, status, is_featured, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    slug: String,
    description: String,
    category: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    stock: i32,
    images: Vec<String>,
    tags: Vec<String>,
    benefits: Vec<String>,
    ingredients: Vec<String>,
    weight_grams: i32,
    status: String,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::new(r.sku).map_err(|e| RepositoryError::DataCorruption(format!("invalid sku in database: {e}")))?;
        let status = r
            .status
            .parse::<ProductStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let stock = u32::try_from(r.stock)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative stock for product {}", r.id)))?;
        let weight_grams = u32::try_from(r.weight_grams).unwrap_or(0);
        Ok(Product::restore(
            r.id, sku, r.name, r.slug, r.description, r.category, Money::inr(r.price),
            r.compare_at_price.map(Money::inr), Quantity::new(stock), r.images, r.tags, r.benefits,
            r.ingredients, weight_grams, status, r.is_featured, r.created_at, r.updated_at,
        ))
    }
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Matched against name, description and tags.
    pub search: Option<String>,
    pub featured: Option<bool>,
    /// Admin listings also see draft and archived products.
    pub include_unpublished: bool,
    pub page: u32,
    pub per_page: u32,
}

/// Category name with the number of active products in it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategorySummary {
    pub category: String,
    pub product_count: i64,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), RepositoryError> {
        const WHERE: &str = "WHERE ($1::text IS NULL OR category = $1) \
             AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%' OR $2 ILIKE ANY(tags)) \
             AND ($3::bool IS NULL OR is_featured = $3) \
             AND ($4 OR status = 'active')";

        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {WHERE} ORDER BY is_featured DESC, created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.category.as_deref())
        .bind(search)
        .bind(filter.featured)
        .bind(filter.include_unpublished)
        .bind(i64::from(filter.per_page))
        .bind(page_offset(filter.page, filter.per_page))
        .fetch_all(self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products {WHERE}"))
            .bind(filter.category.as_deref())
            .bind(search)
            .bind(filter.featured)
            .bind(filter.include_unpublished)
            .fetch_one(self.pool)
            .await?;

        let products = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((products, total.0))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Products for the given ids, in no particular order. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    /// Categories of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategorySummary>, RepositoryError> {
        Ok(sqlx::query_as::<_, CategorySummary>(
            "SELECT category, COUNT(*) AS product_count FROM products WHERE status = 'active' \
             GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU or slug is taken.
    pub async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, sku, name, slug, description, category, price, compare_at_price, stock, images, \
             tags, benefits, ingredients, weight_grams, status, is_featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(product.id)
        .bind(product.sku.as_str())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price.amount())
        .bind(product.compare_at_price.as_ref().map(Money::amount))
        .bind(stock_column(product.stock))
        .bind(&product.images)
        .bind(&product.tags)
        .bind(&product.benefits)
        .bind(&product.ingredients)
        .bind(i32::try_from(product.weight_grams).unwrap_or(i32::MAX))
        .bind(product.status.as_str())
        .bind(product.is_featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_or(e, "a product with this SKU or name already exists"))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product no longer exists, or
    /// `RepositoryError::Conflict` if the SKU or slug is taken.
    pub async fn update(&self, product: &Product) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET sku = $2, name = $3, slug = $4, description = $5, category = $6, price = $7, \
             compare_at_price = $8, stock = $9, images = $10, tags = $11, benefits = $12, ingredients = $13, \
             weight_grams = $14, status = $15, is_featured = $16, updated_at = $17 WHERE id = $1",
        )
        .bind(product.id)
        .bind(product.sku.as_str())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price.amount())
        .bind(product.compare_at_price.as_ref().map(Money::amount))
        .bind(stock_column(product.stock))
        .bind(&product.images)
        .bind(&product.tags)
        .bind(&product.benefits)
        .bind(&product.ingredients)
        .bind(i32::try_from(product.weight_grams).unwrap_or(i32::MAX))
        .bind(product.status.as_str())
        .bind(product.is_featured)
        .bind(product.updated_at)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_or(e, "a product with this SKU or name already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Takes `quantity` units out of stock inside `tx`. Returns `false` when
    /// the product is missing, not active, or has fewer units left.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reserve_stock(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'active' AND stock >= $2",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Puts units back, e.g. when an order is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release_stock(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn stock_column(stock: Quantity) -> i32 {
    i32::try_from(stock.value()).unwrap_or(i32::MAX)
}
