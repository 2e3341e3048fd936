//! Checkout: pricing, coupon checks, gateway orders and order placement.
//!
//! The browser only ever sends product ids and quantities. Prices, discount
//! and shipping are recomputed here from the catalog for every call.
//!
//! Placing an order runs one transaction that redeems the coupon, reserves
//! stock, inserts the order and updates the customer. Coupon usage and stock
//! use guarded single-statement updates, so two checkouts racing for the
//! last coupon use or the last unit cannot both succeed.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{CouponRepository, CustomerRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::domain::aggregates::customer::normalize_email;
use crate::domain::aggregates::{
    Address, Cart, CartLine, CheckoutPayment, CouponRejection, CouponVerdict, CustomerDetails, NewOrder, Order,
    PaymentMethod, PaymentStatus, PricingRules, Quote,
};
use crate::domain::value_objects::{CouponCode, Money, STORE_CURRENCY};
use crate::error::ApiError;
use crate::payments::GatewayClient;
use crate::services::events::EventPublisher;
use crate::services::orders::OrderService;

const ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Cart as submitted for a quote or a gateway order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CartRequest {
    #[validate(length(min = 1, max = 50))]
    #[validate]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: Quote,
    /// Present when a coupon code was sent, valid or not.
    pub coupon: Option<CouponVerdict>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponCheckRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// What the browser needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCheckout {
    pub key_id: String,
    pub gateway_order_id: String,
    /// Paise.
    pub amount: i64,
    pub currency: String,
    pub quote: Quote,
}

/// Gateway references sent with a prepaid order. Payment id and signature
/// are present once the shopper has paid; without them the order waits for
/// the payment webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub gateway_order_id: String,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate]
    pub customer: CustomerDetails,
    #[validate]
    pub shipping_address: Address,
    #[validate(length(min = 1, max = 50))]
    #[validate]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment: Option<GatewayPayment>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentVerification {
    pub verified: bool,
    /// Order the payment settled, when one was already placed.
    pub order_number: Option<String>,
}

struct CouponCheck {
    code: Option<CouponCode>,
    result: Result<Money, CouponRejection>,
}

struct Priced {
    quote: Quote,
    coupon: Option<CouponCheck>,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    gateway: &'a GatewayClient,
    pricing: &'a PricingRules,
    events: &'a EventPublisher,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a GatewayClient,
        pricing: &'a PricingRules,
        events: &'a EventPublisher,
    ) -> Self {
        Self { pool, gateway, pricing, events }
    }

    /// Price a cart. An unusable coupon is reported in the response and not
    /// applied; it does not fail the quote.
    ///
    /// # Errors
    ///
    /// Returns an error when the cart is invalid or a lookup fails.
    pub async fn quote(&self, request: &CartRequest) -> Result<QuoteResponse, ApiError> {
        request.validate()?;
        let priced = self.price(&request.items, request.coupon_code.as_deref()).await?;
        Ok(QuoteResponse {
            quote: priced.quote,
            coupon: priced.coupon.map(|c| CouponVerdict::from_result(c.code.as_ref(), c.result)),
        })
    }

    /// Check a coupon code against a subtotal.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn validate_coupon(&self, request: &CouponCheckRequest) -> Result<CouponVerdict, ApiError> {
        let check = self.check_coupon(&request.code, &Money::inr(request.subtotal)).await?;
        Ok(CouponVerdict::from_result(check.code.as_ref(), check.result))
    }

    /// Create a gateway order for the server-priced cart total.
    ///
    /// # Errors
    ///
    /// Returns the coupon rejection if a coupon was sent and cannot be used,
    /// or a gateway error.
    #[instrument(skip(self, request))]
    pub async fn create_gateway_order(&self, request: &CartRequest) -> Result<GatewayCheckout, ApiError> {
        request.validate()?;
        let priced = self.price(&request.items, request.coupon_code.as_deref()).await?;
        let coupon_code = match priced.coupon {
            Some(check) => {
                check.result?;
                check.code.map(|c| c.to_string())
            }
            None => None,
        };

        let amount = Money::inr(priced.quote.total).to_minor_units()?;
        let receipt = format!("rcpt_{}", Uuid::now_v7().simple());
        let notes = serde_json::json!({
            "items": priced.quote.items.len(),
            "coupon_code": coupon_code,
        });
        let order = self.gateway.create_order(amount, STORE_CURRENCY, &receipt, &notes).await?;

        Ok(GatewayCheckout {
            key_id: self.gateway.key_id().to_string(),
            gateway_order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            quote: priced.quote,
        })
    }

    /// Verify the checkout signature and, when an order already carries this
    /// gateway order, mark it paid.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    #[instrument(skip(self, request), fields(gateway_order_id = %request.gateway_order_id))]
    pub async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<PaymentVerification, ApiError> {
        self.gateway
            .verify_checkout(&request.gateway_order_id, &request.gateway_payment_id, &request.signature)?;
        let order = OrderService::new(self.pool, self.events)
            .apply_gateway_status(
                Some(&request.gateway_order_id),
                Some(&request.gateway_payment_id),
                PaymentStatus::Paid,
            )
            .await?;
        Ok(PaymentVerification { verified: true, order_number: order.map(|o| o.order_number().to_string()) })
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns validation, cart, coupon and payment errors, or a conflict when
    /// stock or coupon uses ran out while the order was being placed.
    #[instrument(skip(self, request), fields(payment_method = request.payment_method.as_str()))]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<Order, ApiError> {
        request.validate()?;
        let priced = self.price(&request.items, request.coupon_code.as_deref()).await?;
        let coupon_code = match priced.coupon {
            Some(check) => {
                check.result?;
                check.code
            }
            None => None,
        };
        let payment = self.resolve_payment(&request, &priced.quote).await?;

        let customer = CustomerDetails {
            name: request.customer.name.trim().to_string(),
            email: normalize_email(&request.customer.email),
            phone: request.customer.phone.trim().to_string(),
        };
        let mut order = Order::place(NewOrder {
            customer,
            shipping_address: request.shipping_address,
            quote: priced.quote,
            coupon_code: coupon_code.as_ref().map(ToString::to_string),
            payment,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        })?;

        let mut tx = self.pool.begin().await?;
        if let Some(code) = &coupon_code {
            if !CouponRepository::redeem(&mut tx, code).await? {
                return Err(CouponRejection::UsageLimitReached.into());
            }
        }
        for item in order.items() {
            if !ProductRepository::reserve_stock(&mut tx, item.product_id, item.quantity).await? {
                return Err(ApiError::Conflict(format!("Not enough stock left for {}", item.name)));
            }
        }
        self.insert_with_fresh_number(&mut tx, &mut order).await?;
        let record = order.record();
        CustomerRepository::record_order(&mut tx, &record.customer, &record.shipping_address, record.total).await?;
        tx.commit().await?;

        info!(
            order_number = %order.order_number(),
            total = %order.total(),
            status = order.status().as_str(),
            "Order placed"
        );
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    /// Inserts `order`, drawing a new order number whenever the generated one
    /// collides. Each attempt runs in a savepoint so a collision does not
    /// abort the surrounding transaction.
    async fn insert_with_fresh_number(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &mut Order,
    ) -> Result<(), ApiError> {
        let mut attempt = 1;
        loop {
            let mut savepoint = Connection::begin(&mut **tx).await?;
            match OrderRepository::insert(&mut savepoint, order).await {
                Ok(()) => {
                    savepoint.commit().await?;
                    return Ok(());
                }
                Err(RepositoryError::OrderNumberTaken) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    savepoint.rollback().await?;
                    warn!(order_number = %order.order_number(), attempt, "Order number collision, drawing another");
                    order.renumber();
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn resolve_payment(&self, request: &PlaceOrderRequest, quote: &Quote) -> Result<CheckoutPayment, ApiError> {
        if request.payment_method == PaymentMethod::Cod {
            return Ok(CheckoutPayment::CashOnDelivery);
        }
        let payment = request
            .payment
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("Payment details are required for prepaid orders".to_string()))?;
        let gateway_order_id = payment.gateway_order_id.trim().to_string();

        let checkout = match (&payment.gateway_payment_id, &payment.signature) {
            (Some(payment_id), Some(signature)) => {
                self.gateway.verify_checkout(&gateway_order_id, payment_id, signature)?;
                CheckoutPayment::Prepaid { gateway_order_id: gateway_order_id.clone(), gateway_payment_id: payment_id.clone() }
            }
            (None, None) => CheckoutPayment::AwaitingGateway { gateway_order_id: gateway_order_id.clone() },
            _ => return Err(ApiError::BadRequest("Payment id and signature must be sent together".to_string())),
        };

        if OrderRepository::new(self.pool).find_by_gateway_order_id(&gateway_order_id).await?.is_some() {
            return Err(ApiError::Conflict("An order already exists for this payment".to_string()));
        }
        let gateway_order = self.gateway.fetch_order(&gateway_order_id).await?;
        if gateway_order.amount != Money::inr(quote.total).to_minor_units()? {
            return Err(ApiError::BadRequest("Payment amount does not match the order total".to_string()));
        }
        Ok(checkout)
    }

    async fn price(&self, lines: &[CartLine], coupon_code: Option<&str>) -> Result<Priced, ApiError> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let catalog = ProductRepository::new(self.pool).find_many(&ids).await?;
        let cart = Cart::from_catalog(&catalog, lines)?;

        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(self.check_coupon(raw, cart.subtotal()).await?),
            None => None,
        };
        let discount = match &coupon {
            Some(CouponCheck { result: Ok(discount), .. }) => discount.clone(),
            _ => Money::zero(STORE_CURRENCY),
        };
        Ok(Priced { quote: cart.quote(&discount, self.pricing), coupon })
    }

    async fn check_coupon(&self, raw: &str, subtotal: &Money) -> Result<CouponCheck, ApiError> {
        let Ok(code) = CouponCode::new(raw) else {
            return Ok(CouponCheck { code: None, result: Err(CouponRejection::NotFound) });
        };
        let result = match CouponRepository::new(self.pool).find_by_code(&code).await? {
            Some(coupon) => coupon.evaluate(subtotal, Utc::now()),
            None => Err(CouponRejection::NotFound),
        };
        Ok(CouponCheck { code: Some(code), result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_request_validation() {
        let request: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "customer": {"name": "Kavya Iyer", "email": "not-an-email", "phone": "9812345678"},
            "shipping_address": {"line1": "44 Anna Salai", "city": "Chennai", "state": "Tamil Nadu", "pincode": "600002"},
            "items": [{"product_id": "0192a7d2-8f3e-7c41-9a0b-3c5d6e7f8a9b", "quantity": 1}],
            "payment_method": "cod"
        }))
        .unwrap();
        assert_eq!(request.shipping_address.country, "India");
        let errors = request.validate().unwrap_err();
        assert!(errors.to_string().contains("email"));
    }

    #[test]
    fn test_payment_method_aliases() {
        let request: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "customer": {"name": "Kavya Iyer", "email": "kavya@example.com", "phone": "9812345678"},
            "shipping_address": {"line1": "44 Anna Salai", "city": "Chennai", "state": "Tamil Nadu", "pincode": "600002"},
            "items": [],
            "payment_method": "razorpay",
            "payment": {"gateway_order_id": "order_X1"}
        }))
        .unwrap();
        assert_eq!(request.payment_method, PaymentMethod::Prepaid);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cart_request_rejects_out_of_range_quantity() {
        let request: CartRequest = serde_json::from_value(serde_json::json!({
            "items": [{"product_id": "0192a7d2-8f3e-7c41-9a0b-3c5d6e7f8a9b", "quantity": 4294967295u32}]
        }))
        .unwrap();
        assert!(request.validate().unwrap_err().to_string().contains("quantity"));
    }
}
