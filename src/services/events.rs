//! Domain event publishing over NATS.

use tracing::{debug, info, warn};

use crate::domain::events::DomainEvent;

/// Publishes domain events when a NATS connection is configured; otherwise
/// events are only logged.
#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    /// Connect to `url` when given. A failed connection is logged and the
    /// publisher falls back to logging only.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            info!("NATS_URL not set, domain events will only be logged");
            return Self::disabled();
        };
        match async_nats::connect(url).await {
            Ok(client) => {
                info!(%url, "Connected to NATS");
                Self { nats: Some(client) }
            }
            Err(e) => {
                warn!(%url, error = %e, "NATS unavailable, domain events will only be logged");
                Self::disabled()
            }
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { nats: None }
    }

    /// Publish `events` in order. Failures are logged; they never fail the
    /// request that produced the events.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let Some(client) = &self.nats else {
                debug!(%subject, ?event, "Domain event");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(%subject, error = %e, "Failed to serialize domain event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "Failed to publish domain event");
            }
        }
    }
}
