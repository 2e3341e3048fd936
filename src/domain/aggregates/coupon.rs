//! Coupon Aggregate
//!
//! Validation runs the checks in a fixed order so customers see the most
//! relevant reason first: active flag, validity window, usage limit, then
//! minimum order amount.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::{CouponCode, CouponCodeError, Money};

#[derive(Clone, Debug, Serialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    pub description: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType { Percentage, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl FromStr for DiscountType {
    type Err = CouponError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(CouponError::UnknownDiscountType(other.to_string())),
        }
    }
}

/// Admin input for creating or replacing a coupon.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CouponDraft {
    pub code: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Decimal,
    #[validate(range(min = 1))]
    pub usage_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool { true }

/// Why a coupon cannot be applied to a given order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,
    #[error("This coupon is no longer active")]
    Inactive,
    #[error("This coupon is not valid yet")]
    NotYetValid,
    #[error("This coupon has expired")]
    Expired,
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("Minimum order amount of ₹{0} required")]
    BelowMinimum(Decimal),
}

/// Outcome shown to the shopper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CouponVerdict {
    pub valid: bool,
    pub code: Option<String>,
    pub discount: Decimal,
    pub message: String,
}

impl CouponVerdict {
    pub fn from_result(code: Option<&CouponCode>, result: Result<Money, CouponRejection>) -> Self {
        match result {
            Ok(discount) => Self {
                valid: true,
                code: code.map(ToString::to_string),
                discount: discount.amount(),
                message: format!("Coupon applied: you save {discount}"),
            },
            Err(rejection) => Self {
                valid: false,
                code: code.map(ToString::to_string),
                discount: Decimal::ZERO,
                message: rejection.to_string(),
            },
        }
    }
}

impl Coupon {
    pub fn create(draft: CouponDraft) -> Result<Self, CouponError> {
        draft_checks(&draft)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), code: CouponCode::new(draft.code)?, description: draft.description,
            discount_type: draft.discount_type, value: draft.value, max_discount: draft.max_discount,
            min_order_amount: draft.min_order_amount, usage_limit: draft.usage_limit, used_count: 0,
            valid_from: draft.valid_from, valid_until: draft.valid_until, is_active: draft.is_active,
            created_at: now, updated_at: now,
        })
    }

    /// Replaces the editable fields; `used_count` is kept.
    pub fn apply_draft(&mut self, draft: CouponDraft) -> Result<(), CouponError> {
        draft_checks(&draft)?;
        self.code = CouponCode::new(draft.code)?;
        self.description = draft.description;
        self.discount_type = draft.discount_type;
        self.value = draft.value;
        self.max_discount = draft.max_discount;
        self.min_order_amount = draft.min_order_amount;
        self.usage_limit = draft.usage_limit;
        self.valid_from = draft.valid_from;
        self.valid_until = draft.valid_until;
        self.is_active = draft.is_active;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Checks the coupon against an order subtotal at `now` and returns the discount.
    pub fn evaluate(&self, subtotal: &Money, now: DateTime<Utc>) -> Result<Money, CouponRejection> {
        if !self.is_active { return Err(CouponRejection::Inactive); }
        if matches!(self.valid_from, Some(from) if now < from) { return Err(CouponRejection::NotYetValid); }
        if matches!(self.valid_until, Some(until) if now > until) { return Err(CouponRejection::Expired); }
        if matches!(self.usage_limit, Some(limit) if self.used_count >= limit) {
            return Err(CouponRejection::UsageLimitReached);
        }
        if subtotal.amount() < self.min_order_amount {
            return Err(CouponRejection::BelowMinimum(self.min_order_amount));
        }
        Ok(self.discount_for(subtotal))
    }

    /// Discount for `subtotal`, ignoring eligibility. Never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: &Money) -> Money {
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = subtotal.percentage(self.value);
                match self.max_discount {
                    Some(cap) => raw.min(&Money::new(cap, subtotal.currency())),
                    None => raw,
                }
            }
            DiscountType::Fixed => Money::new(self.value, subtotal.currency()),
        };
        discount.min(subtotal).rounded()
    }
}

fn draft_checks(draft: &CouponDraft) -> Result<(), CouponError> {
    if draft.value <= Decimal::ZERO { return Err(CouponError::InvalidValue); }
    if draft.discount_type == DiscountType::Percentage && draft.value > Decimal::ONE_HUNDRED {
        return Err(CouponError::InvalidValue);
    }
    if matches!(draft.max_discount, Some(cap) if cap <= Decimal::ZERO) { return Err(CouponError::InvalidValue); }
    if draft.min_order_amount < Decimal::ZERO { return Err(CouponError::InvalidValue); }
    if let (Some(from), Some(until)) = (draft.valid_from, draft.valid_until) {
        if until <= from { return Err(CouponError::InvalidWindow); }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error(transparent)]
    Code(#[from] CouponCodeError),
    #[error("Discount value out of range")]
    InvalidValue,
    #[error("Coupon validity window ends before it starts")]
    InvalidWindow,
    #[error("Unknown discount type: {0}")]
    UnknownDiscountType(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(discount_type: DiscountType, value: i64) -> CouponDraft {
        CouponDraft {
            code: "AYUR20".into(), description: String::new(), discount_type, value: Decimal::new(value, 0),
            max_discount: None, min_order_amount: Decimal::ZERO, usage_limit: None, valid_from: None,
            valid_until: None, is_active: true,
        }
    }

    fn inr(v: i64) -> Money { Money::inr(Decimal::new(v, 0)) }

    #[test]
    fn test_percentage_capped() {
        let coupon = Coupon::create(CouponDraft { max_discount: Some(Decimal::new(50, 0)), ..draft(DiscountType::Percentage, 20) }).unwrap();
        assert_eq!(coupon.evaluate(&inr(1000), Utc::now()).unwrap(), inr(50));
    }

    #[test]
    fn test_percentage_uncapped() {
        let coupon = Coupon::create(draft(DiscountType::Percentage, 15)).unwrap();
        assert_eq!(coupon.evaluate(&inr(499), Utc::now()).unwrap(), Money::inr(Decimal::new(7485, 2)));
    }

    #[test]
    fn test_fixed_never_exceeds_subtotal() {
        let coupon = Coupon::create(draft(DiscountType::Fixed, 200)).unwrap();
        assert_eq!(coupon.evaluate(&inr(150), Utc::now()).unwrap(), inr(150));
        assert_eq!(coupon.evaluate(&inr(900), Utc::now()).unwrap(), inr(200));
    }

    #[test]
    fn test_expired_rejected_regardless() {
        let now = Utc::now();
        let mut coupon = Coupon::create(draft(DiscountType::Fixed, 100)).unwrap();
        coupon.valid_until = Some(now - Duration::days(1));
        assert_eq!(coupon.evaluate(&inr(5000), now), Err(CouponRejection::Expired));
    }

    #[test]
    fn test_not_yet_valid() {
        let now = Utc::now();
        let mut coupon = Coupon::create(draft(DiscountType::Fixed, 100)).unwrap();
        coupon.valid_from = Some(now + Duration::hours(2));
        assert_eq!(coupon.evaluate(&inr(5000), now), Err(CouponRejection::NotYetValid));
    }

    #[test]
    fn test_inactive_checked_first() {
        let now = Utc::now();
        let mut coupon = Coupon::create(draft(DiscountType::Fixed, 100)).unwrap();
        coupon.is_active = false;
        coupon.valid_until = Some(now - Duration::days(1));
        assert_eq!(coupon.evaluate(&inr(5000), now), Err(CouponRejection::Inactive));
    }

    #[test]
    fn test_usage_limit() {
        let mut coupon = Coupon::create(CouponDraft { usage_limit: Some(1), ..draft(DiscountType::Fixed, 100) }).unwrap();
        assert!(coupon.evaluate(&inr(500), Utc::now()).is_ok());
        coupon.used_count = 1;
        assert_eq!(coupon.evaluate(&inr(500), Utc::now()), Err(CouponRejection::UsageLimitReached));
    }

    #[test]
    fn test_minimum_order() {
        let coupon = Coupon::create(CouponDraft { min_order_amount: Decimal::new(999, 0), ..draft(DiscountType::Fixed, 100) }).unwrap();
        let err = coupon.evaluate(&inr(500), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Minimum order amount of ₹999 required");
    }

    #[test]
    fn test_draft_checks() {
        assert_eq!(Coupon::create(draft(DiscountType::Percentage, 120)).unwrap_err(), CouponError::InvalidValue);
        let now = Utc::now();
        let bad_window = CouponDraft { valid_from: Some(now), valid_until: Some(now - Duration::days(1)), ..draft(DiscountType::Fixed, 10) };
        assert_eq!(Coupon::create(bad_window).unwrap_err(), CouponError::InvalidWindow);
    }

    #[test]
    fn test_verdict() {
        let code = CouponCode::new("ayur20").unwrap();
        let verdict = CouponVerdict::from_result(Some(&code), Ok(inr(50)));
        assert!(verdict.valid);
        assert_eq!(verdict.message, "Coupon applied: you save ₹50");
        let verdict = CouponVerdict::from_result(Some(&code), Err(CouponRejection::Expired));
        assert!(!verdict.valid);
        assert_eq!(verdict.discount, Decimal::ZERO);
    }
}
