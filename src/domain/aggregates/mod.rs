//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;
pub mod customer;

pub use product::{Product, ProductDraft, ProductError, ProductStatus};
pub use order::{
    Address, CheckoutPayment, CustomerDetails, LineItem, NewOrder, Order, OrderError, OrderRecord, OrderStatus,
    PaymentMethod, PaymentStatus, Shipment,
};
pub use cart::{Cart, CartError, CartItem, CartLine, PricingRules, Quote};
pub use coupon::{Coupon, CouponDraft, CouponError, CouponRejection, CouponVerdict, DiscountType};
pub use customer::{Customer, CustomerDraft};
