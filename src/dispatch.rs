//! Alert dispatch with bounded retry.
//!
//! A [`Notifier`] performs exactly one send attempt per call. The
//! [`Dispatcher`] wraps it: up to `max_attempts` tries, sleeping
//! `base_delay * attempt` between them, and always returns a
//! [`DeliveryRecord`] instead of an error so a failed send never stops the
//! alerting loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::alert::{AlertEvent, DeliveryRecord, DispatchState};
use crate::error::Result;

// ---

/// Identifier returned by a notifier for a delivered message.
pub type MessageId = String;

/// Transport for alert notifications. One attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name reported by the status endpoint.
    fn kind(&self) -> &'static str;

    async fn send(&self, event: &AlertEvent) -> Result<MessageId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl Dispatcher {
    // ---
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    pub fn notifier_kind(&self) -> &'static str {
        self.notifier.kind()
    }

    /// Send `event`, retrying transient failures.
    pub async fn deliver(&self, event: &AlertEvent) -> DeliveryRecord {
        // ---
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.notifier.send(event).await {
                Ok(message_id) => {
                    info!(
                        alert_id = %event.id,
                        node_id = %event.node_id,
                        attempt,
                        "Alert dispatched, message id {}",
                        message_id
                    );
                    return DeliveryRecord {
                        attempt_count: attempt,
                        last_error,
                        final_state: DispatchState::Sent,
                        message_id: Some(message_id),
                    };
                }
                Err(e) => {
                    warn!(
                        alert_id = %event.id,
                        attempt,
                        max_attempts,
                        "Alert dispatch attempt failed: {}",
                        e
                    );
                    last_error = Some(e.to_string());

                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        DeliveryRecord {
            attempt_count: max_attempts,
            last_error,
            final_state: DispatchState::Error,
            message_id: None,
        }
    }
}
