//! Customer Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::order::Address;

#[derive(Clone, Debug, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub addresses: Vec<Address>,
    pub order_count: u32,
    pub total_spent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin input for creating or editing a customer.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CustomerDraft {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 10, max = 15))]
    pub phone: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

impl Customer {
    pub fn create(draft: CustomerDraft) -> Self {
        let now = Utc::now();
        let mut customer = Self {
            id: Uuid::now_v7(), name: draft.name.trim().to_string(), email: normalize_email(&draft.email),
            phone: draft.phone, addresses: vec![], order_count: 0, total_spent: Decimal::ZERO,
            created_at: now, updated_at: now,
        };
        for address in draft.addresses { customer.remember_address(address); }
        customer
    }

    pub fn apply_draft(&mut self, draft: CustomerDraft) {
        self.name = draft.name.trim().to_string();
        self.email = normalize_email(&draft.email);
        self.phone = draft.phone;
        self.addresses.clear();
        for address in draft.addresses { self.remember_address(address); }
        self.updated_at = Utc::now();
    }

    /// Adds `address` unless an equivalent one is already saved.
    pub fn remember_address(&mut self, address: Address) {
        let known = self.addresses.iter().any(|a| {
            a.pincode == address.pincode && a.line1.trim().eq_ignore_ascii_case(address.line1.trim())
        });
        if !known { self.addresses.push(address); }
    }

    pub fn record_order(&mut self, total: Decimal) {
        self.order_count += 1;
        self.total_spent += total;
        self.updated_at = Utc::now();
    }
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    fn address(line1: &str, pincode: &str) -> Address {
        Address { line1: line1.into(), line2: None, city: "Pune".into(), state: "Maharashtra".into(), pincode: pincode.into(), country: "India".into() }
    }

    #[test]
    fn test_create_normalizes_and_dedups() {
        let c = Customer::create(CustomerDraft {
            name: " Arjun Rao ".into(), email: "Arjun@Example.COM".into(), phone: None,
            addresses: vec![address("5 FC Road", "411004"), address("5 fc road ", "411004"), address("9 JM Road", "411005")],
        });
        assert_eq!(c.name, "Arjun Rao");
        assert_eq!(c.email, "arjun@example.com");
        assert_eq!(c.addresses.len(), 2);
    }

    #[test]
    fn test_record_order() {
        let mut c = Customer::create(CustomerDraft { name: "Arjun".into(), email: "a@example.com".into(), phone: None, addresses: vec![] });
        c.record_order(Decimal::new(410, 0));
        c.record_order(Decimal::new(90, 0));
        assert_eq!(c.order_count, 2);
        assert_eq!(c.total_spent, Decimal::new(500, 0));
    }
}
