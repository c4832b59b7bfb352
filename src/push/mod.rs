/*!
 * Push notification delivery.
 *
 * Moderation transitions never call the push service themselves. They queue
 * a message in the `push_outbox` table inside the same transaction, and the
 * `dispatcher` hands queued messages to a `PushNotifier`:
 * - `fcm`: HTTP client for the Firebase legacy send endpoint
 * - `mock`: in-memory notifier for tests
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::PushError;

pub mod dispatcher;
pub mod fcm;
pub mod mock;

pub use dispatcher::{DispatchSummary, PushDispatcher};
pub use fcm::FcmNotifier;
pub use mock::MockNotifier;

/// Visible part of a push notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title
    pub title: String,
    /// Notification body text
    pub body: String,
    /// URL opened when the notification is clicked
    pub click_action: String,
    /// Icon URL
    pub icon: String,
}

/// Request body sent to the push service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Notification content
    pub notification: Notification,
    /// Device token of the recipient
    pub to: String,
}

impl PushMessage {
    /// Address a notification to a device token
    pub fn new(notification: Notification, to: impl Into<String>) -> Self {
        Self {
            notification,
            to: to.into(),
        }
    }
}

/// Common trait for push delivery backends
#[async_trait]
pub trait PushNotifier: Send + Sync + Debug {
    /// Deliver one message
    ///
    /// # Arguments
    /// * `message` - The message to deliver
    ///
    /// # Returns
    /// * `Result<(), PushError>` - Ok once the service accepted the message
    async fn send(&self, message: &PushMessage) -> Result<(), PushError>;
}
