/*!
 * Outbox dispatcher.
 *
 * Reads queued push events, hands each one to a `PushNotifier` and records
 * the outcome. Every event is attempted exactly once: success marks it
 * delivered, any failure marks it failed with the error text. Processed
 * events are pruned once they are older than the configured retention.
 */

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::database::models::PushEventRecord;
use crate::database::Repository;
use crate::errors::{ConfessionError, PushError};
use crate::push::{PushMessage, PushNotifier};

/// Outcome counters of one outbox sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Events accepted by the push service
    pub delivered: usize,
    /// Events whose single delivery attempt failed
    pub failed: usize,
}

impl DispatchSummary {
    /// Events attempted in the sweep
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Delivers queued push events
#[derive(Debug, Clone)]
pub struct PushDispatcher {
    repo: Repository,
    notifier: Arc<dyn PushNotifier>,
    batch_size: usize,
    /// Age after which processed events are pruned, `None` keeps them
    retention: Option<Duration>,
}

impl PushDispatcher {
    /// Create a dispatcher reading at most `batch_size` events per query
    pub fn new(repo: Repository, notifier: Arc<dyn PushNotifier>, batch_size: usize) -> Self {
        Self {
            repo,
            notifier,
            batch_size: batch_size.max(1),
            retention: None,
        }
    }

    /// Prune delivered and failed events older than `retention` after each sweep
    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    /// Drop processed events past the retention window, if one is set
    pub async fn prune_processed(&self) -> Result<usize, ConfessionError> {
        match self.retention {
            Some(retention) => self.repo.prune_push_events(retention).await,
            None => Ok(0),
        }
    }

    /// Attempt every pending event, oldest first, one batch at a time
    pub async fn dispatch_pending(&self) -> Result<DispatchSummary, ConfessionError> {
        let mut summary = DispatchSummary::default();

        loop {
            let events = self.repo.pending_push_events(self.batch_size).await?;
            if events.is_empty() {
                break;
            }

            for event in events {
                match self.deliver(&event).await {
                    Ok(()) => {
                        self.repo.mark_push_delivered(event.id).await?;
                        summary.delivered += 1;
                    }
                    Err(e) => {
                        warn!(
                            "Push for confession {} ({}) failed: {}",
                            event.confession_id, event.kind, e
                        );
                        self.repo.mark_push_failed(event.id, &e.to_string()).await?;
                        summary.failed += 1;
                    }
                }
            }
        }

        if summary.total() > 0 {
            info!(
                "Push dispatch: {} delivered, {} failed",
                summary.delivered, summary.failed
            );
        }
        Ok(summary)
    }

    async fn deliver(&self, event: &PushEventRecord) -> Result<(), PushError> {
        let message: PushMessage = serde_json::from_str(&event.payload)?;
        debug!("Sending {} push for confession {}", event.kind, event.confession_id);
        self.notifier.send(&message).await
    }

    /// Sweep the outbox on a fixed interval until the task is dropped
    pub async fn run(&self, interval: Duration) {
        // tokio panics on a zero period
        let mut interval = tokio::time::interval(interval.max(Duration::from_millis(1)));

        loop {
            interval.tick().await;

            if let Err(e) = self.dispatch_pending().await {
                warn!("Push dispatch error: {}", e);
            }
            if let Err(e) = self.prune_processed().await {
                warn!("Push outbox pruning error: {}", e);
            }
        }
    }
}
