//! Value Objects for the store

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Currency every price in the catalog is quoted in.
pub const STORE_CURRENCY: &str = "INR";

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn inr(amount: Decimal) -> Self { Self::new(amount, STORE_CURRENCY) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    /// Subtracts `other`, clamping at zero.
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new((self.amount - other.amount).max(Decimal::ZERO), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// `percent`% of this amount, rounded to paise.
    pub fn percentage(&self, percent: Decimal) -> Money {
        Money::new(self.amount * percent / Decimal::ONE_HUNDRED, &self.currency).rounded()
    }

    pub fn min(&self, other: &Money) -> Money {
        if other.amount < self.amount { other.clone() } else { self.clone() }
    }

    pub fn rounded(&self) -> Money {
        Money::new(self.amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), &self.currency)
    }

    /// Amount in the smallest currency unit, as payment gateways expect it.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let paise = (self.rounded().amount * Decimal::ONE_HUNDRED).trunc();
        i64::try_from(paise).map_err(|_| MoneyError::Overflow)
    }
}

impl Default for Money { fn default() -> Self { Self::zero(STORE_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.currency == STORE_CURRENCY { write!(f, "₹{}", self.amount) } else { write!(f, "{} {}", self.amount, self.currency) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
    #[error("Amount out of range")]
    Overflow,
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Human-facing order reference, `AYU-YYYYMMDD-NNNNNN`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

const ORDER_PREFIX: &str = "AYU";

impl OrderNumber {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("{ORDER_PREFIX}-{}-{suffix:06}", at.format("%Y%m%d")))
    }

    pub fn parse(value: &str) -> Result<Self, OrderNumberError> {
        let value = value.trim().to_uppercase();
        let mut parts = value.split('-');
        let (Some(prefix), Some(date), Some(seq), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(OrderNumberError::Malformed);
        };
        if prefix != ORDER_PREFIX { return Err(OrderNumberError::Malformed); }
        if date.len() != 8 || NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
            return Err(OrderNumberError::Malformed);
        }
        if seq.len() != 6 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::Malformed);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<OrderNumber> for String {
    fn from(n: OrderNumber) -> Self { n.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderNumberError {
    #[error("Malformed order number")]
    Malformed,
}

/// Coupon code as customers type it; stored uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.len() < 3 { return Err(CouponCodeError::TooShort); }
        if value.len() > 32 { return Err(CouponCodeError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(CouponCodeError::InvalidCharacter);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(c: CouponCode) -> Self { c.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponCodeError {
    #[error("Coupon code too short")]
    TooShort,
    #[error("Coupon code too long")]
    TooLong,
    #[error("Coupon code may only contain letters, digits, '-' and '_'")]
    InvalidCharacter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sku() { let sku = Sku::new("ashwa-60").unwrap(); assert_eq!(sku.as_str(), "ASHWA-60"); }

    #[test]
    fn test_money_add() {
        let a = Money::inr(Decimal::new(100, 0));
        let b = Money::inr(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::new(Decimal::ONE, "USD")), Err(MoneyError::CurrencyMismatch));
    }

    #[test]
    fn test_money_minor_units() {
        let m = Money::inr(Decimal::new(49950, 2));
        assert_eq!(m.to_minor_units().unwrap(), 49950);
        assert_eq!(Money::inr(Decimal::new(10005, 3)).to_minor_units().unwrap(), 1001);
    }

    #[test]
    fn test_money_saturating_sub() {
        let a = Money::inr(Decimal::new(30, 0));
        let b = Money::inr(Decimal::new(50, 0));
        assert!(a.saturating_sub(&b).unwrap().is_zero());
    }

    #[test]
    fn test_order_number_roundtrip() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        let n = OrderNumber::generate(at);
        assert!(n.as_str().starts_with("AYU-20261017-"));
        assert_eq!(OrderNumber::parse(n.as_str()).unwrap(), n);
    }

    #[test]
    fn test_order_number_rejects_uuid() {
        assert!(OrderNumber::parse("0190c3a4-8f5e-7a11-b3a2-5d2e1f0c9a77").is_err());
        assert!(OrderNumber::parse("AYU-20261399-000001").is_err());
        assert!(OrderNumber::parse("AYU-20261017-12345").is_err());
    }

    #[test]
    fn test_coupon_code() {
        assert_eq!(CouponCode::new(" welcome10 ").unwrap().as_str(), "WELCOME10");
        assert_eq!(CouponCode::new("ab"), Err(CouponCodeError::TooShort));
        assert_eq!(CouponCode::new("SAVE 10"), Err(CouponCodeError::InvalidCharacter));
    }
}
