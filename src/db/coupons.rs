//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{conflict_or, RepositoryError};
use crate::domain::aggregates::{Coupon, DiscountType};
use crate::domain::value_objects::CouponCode;

const COUPON_COLUMNS: &str = "id, code, description, discount_type, value, max_discount, min_order_amount, \
     usage_limit, used_count, valid_from, valid_until, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    description: String,
    discount_type: String,
    value: Decimal,
    max_discount: Option<Decimal>,
    min_order_amount: Decimal,
    usage_limit: Option<i32>,
    used_count: i32,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        let code = CouponCode::new(r.code)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid coupon code in database: {e}")))?;
        let discount_type = r
            .discount_type
            .parse::<DiscountType>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(Self {
            id: r.id,
            code,
            description: r.description,
            discount_type,
            value: r.value,
            max_discount: r.max_discount,
            min_order_amount: r.min_order_amount,
            usage_limit: r.usage_limit.map(|l| u32::try_from(l).unwrap_or(0)),
            used_count: u32::try_from(r.used_count).unwrap_or(0),
            valid_from: r.valid_from,
            valid_until: r.valid_until,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC"))
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, RepositoryError> {
        sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Coupon::try_from)
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"))
            .bind(code.as_str())
            .fetch_optional(self.pool)
            .await?
            .map(Coupon::try_from)
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn insert(&self, coupon: &Coupon) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO coupons (id, code, description, discount_type, value, max_discount, min_order_amount, \
             usage_limit, used_count, valid_from, valid_until, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(coupon.id)
        .bind(coupon.code.as_str())
        .bind(&coupon.description)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.value)
        .bind(coupon.max_discount)
        .bind(coupon.min_order_amount)
        .bind(coupon.usage_limit.map(limit_column))
        .bind(limit_column(coupon.used_count))
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_or(e, "a coupon with this code already exists"))?;
        Ok(())
    }

    /// Saves the editable fields. `used_count` is owned by checkout and left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon no longer exists, or
    /// `RepositoryError::Conflict` if the code is taken.
    pub async fn update(&self, coupon: &Coupon) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE coupons SET code = $2, description = $3, discount_type = $4, value = $5, max_discount = $6, \
             min_order_amount = $7, usage_limit = $8, valid_from = $9, valid_until = $10, is_active = $11, \
             updated_at = $12 WHERE id = $1",
        )
        .bind(coupon.id)
        .bind(coupon.code.as_str())
        .bind(&coupon.description)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.value)
        .bind(coupon.max_discount)
        .bind(coupon.min_order_amount)
        .bind(coupon.usage_limit.map(limit_column))
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .bind(coupon.updated_at)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_or(e, "a coupon with this code already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such coupon exists.
    pub async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Counts one use of `code` inside `tx`. Returns `false`, changing
    /// nothing, when the coupon is inactive or its usage limit is used up.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn redeem(tx: &mut Transaction<'_, Postgres>, code: &CouponCode) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1, updated_at = NOW() \
             WHERE code = $1 AND is_active AND (usage_limit IS NULL OR used_count < usage_limit)",
        )
        .bind(code.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn limit_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
