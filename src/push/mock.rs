/*!
 * Mock push notifier for testing.
 *
 * - `MockNotifier::working()` - Accepts every message and records it
 * - `MockNotifier::failing()` - Rejects every message
 * - `MockNotifier::failing_for(token)` - Rejects messages to one device token
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::PushError;
use crate::push::{PushMessage, PushNotifier};

/// Behavior mode for the mock notifier
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always accepts
    Working,
    /// Always fails with a service error
    Failing,
    /// Fails only for the given device token
    FailingFor(String),
}

/// Mock notifier recording every accepted message
#[derive(Debug, Clone)]
pub struct MockNotifier {
    behavior: MockBehavior,
    /// Number of send attempts, successful or not
    attempts: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<PushMessage>>>,
}

impl MockNotifier {
    /// Create a new mock notifier with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            attempts: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn failing_for(token: impl Into<String>) -> Self {
        Self::new(MockBehavior::FailingFor(token.into()))
    }

    /// Number of send attempts so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Messages accepted so far, in send order
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PushNotifier for MockNotifier {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let fail = match &self.behavior {
            MockBehavior::Working => false,
            MockBehavior::Failing => true,
            MockBehavior::FailingFor(token) => *token == message.to,
        };

        if fail {
            return Err(PushError::ApiError {
                status_code: 500,
                message: "Mock push failure".to_string(),
            });
        }

        self.sent.lock().push(message.clone());
        Ok(())
    }
}
