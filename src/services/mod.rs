//! Business operations spanning repositories and external providers.

pub mod auth;
pub mod checkout;
pub mod events;
pub mod fulfillment;
pub mod orders;

pub use auth::{AuthError, AuthService, CurrentUser};
pub use checkout::CheckoutService;
pub use events::EventPublisher;
pub use fulfillment::FulfillmentService;
pub use orders::OrderService;
