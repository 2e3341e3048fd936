//! Ayurvedic Store
//!
//! Storefront and back-office API for a small Ayurvedic products shop.
//!
//! ## Features
//! - Product catalog with categories, search and featured products
//! - Server-priced checkout with coupons and free-shipping threshold
//! - Cash on delivery and prepaid orders through the payment gateway
//! - Signed payment webhooks reconciling order payment status
//! - Shipment booking and AWB tracking with the logistics provider
//! - Admin panel API: products, orders, customers, coupons, settings, stats
//! - Domain events published to NATS

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod services;
pub mod shipping;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::AppState;
