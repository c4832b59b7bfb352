/*!
 * Moderation manager for the confession lifecycle.
 *
 * This module handles:
 * - Submitting and editing confessions
 * - Approve, reject and rollback transitions
 * - Listing, overview counters and keyword search
 * - Push token resync
 *
 * Overview, approved listings and search results are served from the shared
 * cache. Any successful write flushes it.
 */

use anyhow::Result;
use log::{debug, info, warn};

use crate::app_config::PushConfig;
use crate::cache::{default_expiration, TtlCache};
use crate::database::models::{Confession, Overview};
use crate::database::repository::{Repository, SEARCH_LIMIT};
use crate::errors::ConfessionError;
use crate::push::Notification;

/// Read results kept in the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedView {
    Overview(Overview),
    Confessions(Vec<Confession>),
}

const OVERVIEW_KEY: &str = "confessions:overview";

fn approved_key(limit: usize) -> String {
    format!("confessions:approved:{}", limit)
}

fn search_key(keyword: &str) -> String {
    format!("confessions:search:{}", keyword)
}

/// Moderation manager over the confession store
#[derive(Clone)]
pub struct ModerationManager {
    /// Repository for database operations
    repo: Repository,
    /// Shared read cache
    cache: TtlCache<String, CachedView>,
    /// Sent when a confession is approved
    approved_notification: Notification,
    /// Sent when a confession is rejected
    rejected_notification: Notification,
}

impl ModerationManager {
    /// Create a new manager
    pub fn new(
        repo: Repository,
        cache: TtlCache<String, CachedView>,
        push: &PushConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            approved_notification: push.approved.clone(),
            rejected_notification: push.rejected.clone(),
        }
    }

    /// Create a manager over an in-memory database with default settings (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let repo = Repository::new_in_memory()?;
        let cache = TtlCache::from_config(&Default::default());
        Ok(Self::new(repo, cache, &PushConfig::default()))
    }

    /// Get the underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Get the shared cache handle
    pub fn cache(&self) -> &TtlCache<String, CachedView> {
        &self.cache
    }

    fn invalidate(&self) {
        let dropped = self.cache.item_count();
        self.cache.flush();
        if dropped > 0 {
            debug!("Flushed {} cached views", dropped);
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Up to `limit` confessions, newest first, any status
    pub async fn fetch_all(&self, limit: usize) -> Result<Vec<Confession>, ConfessionError> {
        self.repo.fetch_all(limit).await
    }

    /// One confession by key
    pub async fn fetch_by_id(&self, id: i64) -> Result<Confession, ConfessionError> {
        self.repo.fetch_by_id(id).await
    }

    /// A sender's confessions, newest first, any status
    pub async fn fetch_by_sender(
        &self,
        sender: &str,
        limit: usize,
    ) -> Result<Vec<Confession>, ConfessionError> {
        self.repo.fetch_by_sender(sender, limit).await
    }

    /// Total, pending and rejected counts
    pub async fn fetch_overview(&self) -> Result<Overview, ConfessionError> {
        let key = OVERVIEW_KEY.to_string();
        if let Some(CachedView::Overview(overview)) = self.cache.get(&key) {
            return Ok(overview);
        }

        let overview = self.repo.fetch_overview().await?;
        self.cache.set(key, CachedView::Overview(overview), default_expiration());
        Ok(overview)
    }

    /// Up to `limit` approved confessions, newest first
    pub async fn fetch_approved(&self, limit: usize) -> Result<Vec<Confession>, ConfessionError> {
        let key = approved_key(limit);
        if let Some(CachedView::Confessions(confessions)) = self.cache.get(&key) {
            return Ok(confessions);
        }

        let confessions = self.repo.fetch_approved(limit).await?;
        self.cache.set(key, CachedView::Confessions(confessions.clone()), default_expiration());
        Ok(confessions)
    }

    /// Approved confessions containing `keyword`, newest first, at most 50
    pub async fn search(&self, keyword: &str) -> Result<Vec<Confession>, ConfessionError> {
        let key = search_key(keyword);
        if let Some(CachedView::Confessions(confessions)) = self.cache.get(&key) {
            return Ok(confessions);
        }

        let confessions = self.repo.search(keyword, SEARCH_LIMIT).await?;
        self.cache.set(key, CachedView::Confessions(confessions.clone()), default_expiration());
        Ok(confessions)
    }

    /// Public number the next approval would receive
    pub async fn next_confession_id(&self) -> Result<i64, ConfessionError> {
        self.repo.next_confession_id().await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a new confession
    pub async fn create(&self, confession: &mut Confession) -> Result<(), ConfessionError> {
        self.repo.create(confession).await?;
        self.invalidate();
        info!("Confession {} submitted", confession.id);
        Ok(())
    }

    /// Create or fully update a confession
    pub async fn save(&self, confession: &mut Confession) -> Result<(), ConfessionError> {
        self.repo.save(confession).await?;
        self.invalidate();
        Ok(())
    }

    /// Approve a pending confession; its notification is queued for delivery
    pub async fn approve(&self, id: i64, approver: i64) -> Result<Confession, ConfessionError> {
        let confession = self
            .repo
            .approve(id, approver, &self.approved_notification)
            .await?;
        self.invalidate();

        info!(
            "Confession {} approved by {} as #{}",
            confession.id, approver, confession.cfs_id
        );
        Ok(confession)
    }

    /// Return a confession to the pending state
    ///
    /// The current status is not checked, so this also reopens rejected
    /// confessions. No notification is sent.
    pub async fn rollback_approval(
        &self,
        id: i64,
        approver: i64,
    ) -> Result<Confession, ConfessionError> {
        let confession = self.repo.rollback_approval(id).await?;
        self.invalidate();

        info!("Confession {} returned to pending by {}", id, approver);
        Ok(confession)
    }

    /// Reject a pending confession; its notification is queued for delivery
    pub async fn reject(
        &self,
        id: i64,
        approver: i64,
        reason: &str,
    ) -> Result<Confession, ConfessionError> {
        let confession = self
            .repo
            .reject(id, approver, reason, &self.rejected_notification)
            .await?;
        self.invalidate();

        info!("Confession {} rejected by {}", id, approver);
        Ok(confession)
    }

    /// Point every confession of `sender` at a new push token
    ///
    /// Failures are logged and swallowed.
    pub async fn sync_push_id(&self, sender: &str, push_id: &str) {
        match self.repo.sync_push_id(sender, push_id).await {
            Ok(count) => {
                debug!("Updated push token on {} confessions of {}", count, sender);
                self.invalidate();
            }
            Err(e) => warn!("Failed to sync push token for {}: {}", sender, e),
        }
    }

    /// Tombstone a confession
    pub async fn soft_delete(&self, id: i64) -> Result<(), ConfessionError> {
        self.repo.soft_delete(id).await?;
        self.invalidate();

        info!("Confession {} deleted", id);
        Ok(())
    }
}
