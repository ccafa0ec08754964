//! Notification outbox
//!
//! Emails and SMS messages are not sent inline. Services push a
//! [`Notification`] onto a queue that a separate mailer drains. Delivery is
//! best effort: [`dispatch`] never reports failure to its caller.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::cache::RedisPool;

/// Redis list the mailer consumes
pub const OUTBOX_KEY: &str = "notifications:outbox";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Email address or phone number
    pub to: String,
    pub subject: String,
    /// Template name known to the mailer
    pub template: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<()>;
}

/// Queue backed by a Redis list
#[derive(Clone)]
pub struct RedisNotificationQueue {
    pool: RedisPool,
    key: String,
}

impl RedisNotificationQueue {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            key: OUTBOX_KEY.to_string(),
        }
    }
}

#[async_trait]
impl NotificationQueue for RedisNotificationQueue {
    async fn enqueue(&self, notification: Notification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        self.pool.push(&self.key, &payload).await?;
        info!(
            "Queued '{}' notification with template {}",
            notification.subject, notification.template
        );
        Ok(())
    }
}

/// Queue that keeps messages in memory, for local runs and tests
#[derive(Default, Clone)]
pub struct InMemoryNotificationQueue {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue whose every enqueue fails
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationQueue for InMemoryNotificationQueue {
    async fn enqueue(&self, notification: Notification) -> Result<()> {
        if self.fail {
            anyhow::bail!("notification queue unavailable");
        }

        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notification queue lock poisoned"))?
            .push(notification);
        Ok(())
    }
}

/// Enqueue on a background task; failures are logged and dropped
pub fn dispatch(queue: Arc<dyn NotificationQueue>, notification: Notification) {
    tokio::spawn(async move {
        let template = notification.template.clone();
        if let Err(e) = queue.enqueue(notification).await {
            warn!("Failed to enqueue {} notification: {:#}", template, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn receipt() -> Notification {
        Notification {
            to: "asha@farm.in".to_string(),
            subject: "Payment received".to_string(),
            template: "payment_receipt".to_string(),
            data: json!({"amount": 49900}),
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_in_background() {
        let queue = InMemoryNotificationQueue::new();
        dispatch(Arc::new(queue.clone()), receipt());

        tokio::time::timeout(Duration::from_secs(1), async {
            while queue.sent().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(queue.sent(), vec![receipt()]);
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let queue = InMemoryNotificationQueue::failing();
        dispatch(Arc::new(queue.clone()), receipt());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(queue.sent().is_empty());
    }

    #[test]
    fn notification_serializes_for_the_mailer() {
        let value = serde_json::to_value(receipt()).unwrap();
        assert_eq!(value["template"], "payment_receipt");
        assert_eq!(value["data"]["amount"], 49900);
    }
}
