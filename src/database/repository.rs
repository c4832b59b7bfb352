/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all confession store operations,
 * abstracting away the SQL details and providing type-safe access.
 *
 * Soft-deleted rows are invisible to every read and count. Moderation
 * transitions run as a single immediate transaction: the status check, the
 * public number assignment, the conditional update and the outbox insert
 * either all happen or none do.
 */

use log::{debug, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::time::Duration;

use super::connection::DatabaseConnection;
use super::models::{
    now_timestamp, timestamp_at, Confession, ConfessionStatus, Overview, PushEventKind, PushEventRecord,
    PushEventStatus,
};
use crate::app_config::DatabaseConfig;
use crate::errors::ConfessionError;
use crate::push::{Notification, PushMessage};

/// Maximum number of results returned by a keyword search
pub const SEARCH_LIMIT: usize = 50;

const CONFESSION_COLUMNS: &str = "id, created_at, updated_at, deleted_at, content, sender, \
     push_id, status, approver, reason, cfs_id";

const PUSH_EVENT_COLUMNS: &str =
    "id, confession_id, kind, push_id, payload, status, last_error, created_at, processed_at";

type RepoResult<T> = Result<T, ConfessionError>;

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> anyhow::Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Open the database described by the configuration
    pub fn open(config: &DatabaseConfig) -> anyhow::Result<Self> {
        match config.explicit_path() {
            Some(path) => Ok(Self::new(DatabaseConnection::new(path)?)),
            None => Self::new_default(),
        }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Confession Operations
    // =========================================================================

    /// Newest confessions first, regardless of status
    pub async fn fetch_all(&self, limit: usize) -> RepoResult<Vec<Confession>> {
        let confessions = self
            .db
            .execute_async(move |conn| {
                Self::query_confessions(
                    conn,
                    "deleted_at IS NULL",
                    params![limit as i64],
                )
            })
            .await?;

        Ok(confessions)
    }

    /// Load a live confession by key
    pub async fn fetch_by_id(&self, id: i64) -> RepoResult<Confession> {
        let confession = self
            .db
            .execute_async(move |conn| Ok(Self::get_confession_sync(conn, id)?))
            .await?;

        confession.ok_or(ConfessionError::NotFound(id))
    }

    /// Insert a new confession, assigning its key and timestamps
    pub async fn create(&self, confession: &mut Confession) -> RepoResult<()> {
        if !confession.is_new() {
            return Err(ConfessionError::InvalidState(
                "New records can not have primary key id".to_string(),
            ));
        }
        confession.validate()?;

        let mut record = confession.clone();
        let now = now_timestamp();
        record.created_at = Some(now.clone());
        record.updated_at = Some(now);

        let created = self
            .db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO confessions (
                        created_at, updated_at, deleted_at, content, sender, push_id,
                        status, approver, reason, cfs_id
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        record.created_at,
                        record.updated_at,
                        record.deleted_at,
                        record.content,
                        record.sender,
                        record.push_id,
                        record.status,
                        record.approver,
                        record.reason,
                        record.cfs_id,
                    ],
                )?;
                record.id = conn.last_insert_rowid();
                Ok(record)
            })
            .await?;

        debug!("Created confession {} from sender {}", created.id, created.sender);
        *confession = created;
        Ok(())
    }

    /// Create the confession if it has no key, otherwise update every column
    pub async fn save(&self, confession: &mut Confession) -> RepoResult<()> {
        if confession.is_new() {
            return self.create(confession).await;
        }
        confession.validate()?;

        let mut record = confession.clone();
        record.updated_at = Some(now_timestamp());

        let updated = self
            .db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE confessions
                    SET created_at = ?1, updated_at = ?2, deleted_at = ?3, content = ?4,
                        sender = ?5, push_id = ?6, status = ?7, approver = ?8, reason = ?9,
                        cfs_id = ?10
                    WHERE id = ?11
                    "#,
                    params![
                        record.created_at,
                        record.updated_at,
                        record.deleted_at,
                        record.content,
                        record.sender,
                        record.push_id,
                        record.status,
                        record.approver,
                        record.reason,
                        record.cfs_id,
                        record.id,
                    ],
                )?;
                Ok((changed, record))
            })
            .await?;

        match updated {
            (0, record) => Err(ConfessionError::NotFound(record.id)),
            (_, record) => {
                *confession = record;
                Ok(())
            }
        }
    }

    /// Newest confessions of one sender, regardless of status
    pub async fn fetch_by_sender(&self, sender: &str, limit: usize) -> RepoResult<Vec<Confession>> {
        let sender = sender.to_string();

        let confessions = self
            .db
            .execute_async(move |conn| {
                Self::query_confessions(
                    conn,
                    "deleted_at IS NULL AND sender = ?2",
                    params![limit as i64, sender],
                )
            })
            .await?;

        Ok(confessions)
    }

    /// Total, pending and rejected counts
    pub async fn fetch_overview(&self) -> RepoResult<Overview> {
        let overview = self
            .db
            .execute_async(|conn| {
                Ok(conn.query_row(
                    r#"
                    SELECT COUNT(*),
                           COALESCE(SUM(status = 0), 0),
                           COALESCE(SUM(status = 2), 0)
                    FROM confessions
                    WHERE deleted_at IS NULL
                    "#,
                    [],
                    |row| {
                        Ok(Overview {
                            total: row.get(0)?,
                            pending: row.get(1)?,
                            rejected: row.get(2)?,
                        })
                    },
                )?)
            })
            .await?;

        Ok(overview)
    }

    /// Newest approved confessions
    pub async fn fetch_approved(&self, limit: usize) -> RepoResult<Vec<Confession>> {
        let confessions = self
            .db
            .execute_async(move |conn| {
                Self::query_confessions(
                    conn,
                    "deleted_at IS NULL AND status = 1",
                    params![limit as i64],
                )
            })
            .await?;

        Ok(confessions)
    }

    /// Public number the next approval would receive
    pub async fn next_confession_id(&self) -> RepoResult<i64> {
        let next = self
            .db
            .execute_async(|conn| Ok(Self::next_confession_id_sync(conn)?))
            .await?;

        Ok(next)
    }

    /// Approve a pending confession and queue its notification
    pub async fn approve(
        &self,
        id: i64,
        approver: i64,
        notification: &Notification,
    ) -> RepoResult<Confession> {
        let notification = notification.clone();

        let approved = self
            .db
            .transaction_async(move |tx| {
                let mut confession =
                    Self::get_confession_sync(tx, id)?.ok_or(ConfessionError::NotFound(id))?;

                if !confession.status.can_transition_to(ConfessionStatus::Approved) {
                    return Err(ConfessionError::InvalidState(
                        "Status of confession must be pending to be approved".to_string(),
                    )
                    .into());
                }

                let cfs_id = Self::next_confession_id_sync(tx)?;
                confession.mark_approved(approver, cfs_id);
                confession.updated_at = Some(now_timestamp());

                let changed = tx.execute(
                    r#"
                    UPDATE confessions
                    SET status = ?1, approver = ?2, cfs_id = ?3, updated_at = ?4
                    WHERE id = ?5 AND status = ?6 AND deleted_at IS NULL
                    "#,
                    params![
                        confession.status,
                        confession.approver,
                        confession.cfs_id,
                        confession.updated_at,
                        id,
                        ConfessionStatus::Pending,
                    ],
                )?;
                if changed != 1 {
                    return Err(ConfessionError::InvalidState(
                        "Confession changed while being approved".to_string(),
                    )
                    .into());
                }

                Self::enqueue_push_sync(tx, &confession, PushEventKind::Approved, notification)?;
                Ok(confession)
            })
            .await?;

        Ok(approved)
    }

    /// Put a confession back into the pending state
    ///
    /// Runs whatever the current status is. Callers that want a stricter rule
    /// check the status first.
    pub async fn rollback_approval(&self, id: i64) -> RepoResult<Confession> {
        let rolled_back = self
            .db
            .transaction_async(move |tx| {
                let mut confession =
                    Self::get_confession_sync(tx, id)?.ok_or(ConfessionError::NotFound(id))?;

                if confession.status != ConfessionStatus::Approved {
                    warn!(
                        "Rolling back confession {} which is {}, not approved",
                        id, confession.status
                    );
                }

                confession.reset_to_pending();
                confession.updated_at = Some(now_timestamp());

                tx.execute(
                    r#"
                    UPDATE confessions
                    SET status = ?1, approver = ?2, cfs_id = ?3, reason = ?4, updated_at = ?5
                    WHERE id = ?6
                    "#,
                    params![
                        confession.status,
                        confession.approver,
                        confession.cfs_id,
                        confession.reason,
                        confession.updated_at,
                        id,
                    ],
                )?;
                Ok(confession)
            })
            .await?;

        Ok(rolled_back)
    }

    /// Reject a pending confession and queue its notification
    pub async fn reject(
        &self,
        id: i64,
        approver: i64,
        reason: &str,
        notification: &Notification,
    ) -> RepoResult<Confession> {
        let reason = reason.to_string();
        let notification = notification.clone();

        let rejected = self
            .db
            .transaction_async(move |tx| {
                let mut confession =
                    Self::get_confession_sync(tx, id)?.ok_or(ConfessionError::NotFound(id))?;

                if !confession.status.can_transition_to(ConfessionStatus::Rejected) {
                    return Err(ConfessionError::InvalidState(
                        "Status of confession must be pending to be rejected".to_string(),
                    )
                    .into());
                }

                confession.mark_rejected(approver, &reason);
                confession.updated_at = Some(now_timestamp());

                let changed = tx.execute(
                    r#"
                    UPDATE confessions
                    SET status = ?1, approver = ?2, reason = ?3, updated_at = ?4
                    WHERE id = ?5 AND status = ?6 AND deleted_at IS NULL
                    "#,
                    params![
                        confession.status,
                        confession.approver,
                        confession.reason,
                        confession.updated_at,
                        id,
                        ConfessionStatus::Pending,
                    ],
                )?;
                if changed != 1 {
                    return Err(ConfessionError::InvalidState(
                        "Confession changed while being rejected".to_string(),
                    )
                    .into());
                }

                Self::enqueue_push_sync(tx, &confession, PushEventKind::Rejected, notification)?;
                Ok(confession)
            })
            .await?;

        Ok(rejected)
    }

    /// Approved confessions whose content contains `keyword`, newest first
    ///
    /// Matching uses SQLite `LIKE`, so it ignores ASCII case. Wildcard
    /// characters in the keyword match literally.
    pub async fn search(&self, keyword: &str, limit: usize) -> RepoResult<Vec<Confession>> {
        let pattern = like_pattern(keyword);

        let confessions = self
            .db
            .execute_async(move |conn| {
                Self::query_confessions(
                    conn,
                    "deleted_at IS NULL AND status = 1 AND content LIKE ?2 ESCAPE '\\'",
                    params![limit as i64, pattern],
                )
            })
            .await?;

        Ok(confessions)
    }

    /// Replace the push token on every live confession of a sender
    pub async fn sync_push_id(&self, sender: &str, push_id: &str) -> RepoResult<usize> {
        if push_id.trim().is_empty() {
            return Err(ConfessionError::Validation("push id must not be empty".to_string()));
        }
        let sender = sender.to_string();
        let push_id = push_id.to_string();

        let changed = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "UPDATE confessions SET push_id = ?1, updated_at = ?2 WHERE sender = ?3 AND deleted_at IS NULL",
                    params![push_id, now_timestamp(), sender],
                )?)
            })
            .await?;

        Ok(changed)
    }

    /// Tombstone a confession; the row is kept but disappears from reads
    pub async fn soft_delete(&self, id: i64) -> RepoResult<()> {
        let changed = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "UPDATE confessions SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                    params![now_timestamp(), id],
                )?)
            })
            .await?;

        if changed == 0 {
            return Err(ConfessionError::NotFound(id));
        }
        Ok(())
    }

    fn get_confession_sync(conn: &Connection, id: i64) -> rusqlite::Result<Option<Confession>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM confessions WHERE id = ?1 AND deleted_at IS NULL",
                CONFESSION_COLUMNS
            ),
            [id],
            confession_from_row,
        )
        .optional()
    }

    // `filter` may reference ?2 onwards; ?1 is always the limit
    fn query_confessions(
        conn: &Connection,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> anyhow::Result<Vec<Confession>> {
        let sql = format!(
            "SELECT {} FROM confessions WHERE {} ORDER BY id DESC LIMIT ?1",
            CONFESSION_COLUMNS, filter
        );

        let mut stmt = conn.prepare(&sql)?;
        let confessions = stmt
            .query_map(params, confession_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(confessions)
    }

    // Tombstoned rows count too, so a public number is never handed out twice
    fn next_confession_id_sync(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT COALESCE(MAX(cfs_id), 0) + 1 FROM confessions",
            [],
            |row| row.get(0),
        )
    }

    // =========================================================================
    // Push Outbox Operations
    // =========================================================================

    fn enqueue_push_sync(
        conn: &Connection,
        confession: &Confession,
        kind: PushEventKind,
        notification: Notification,
    ) -> anyhow::Result<i64> {
        let message = PushMessage::new(notification, confession.push_id.clone());
        let payload = serde_json::to_string(&message)?;

        conn.execute(
            r#"
            INSERT INTO push_outbox (confession_id, kind, push_id, payload, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                confession.id,
                kind.to_string(),
                confession.push_id,
                payload,
                PushEventStatus::Pending.to_string(),
                now_timestamp(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Oldest undelivered push notifications
    pub async fn pending_push_events(&self, limit: usize) -> RepoResult<Vec<PushEventRecord>> {
        let events = self
            .db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM push_outbox WHERE status = ?1 ORDER BY id ASC LIMIT ?2",
                    PUSH_EVENT_COLUMNS
                ))?;

                let events = stmt
                    .query_map(
                        params![PushEventStatus::Pending.to_string(), limit as i64],
                        push_event_from_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(events)
            })
            .await?;

        Ok(events)
    }

    /// All outbox entries queued for one confession, oldest first
    pub async fn push_events_for(&self, confession_id: i64) -> RepoResult<Vec<PushEventRecord>> {
        let events = self
            .db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM push_outbox WHERE confession_id = ?1 ORDER BY id ASC",
                    PUSH_EVENT_COLUMNS
                ))?;

                let events = stmt
                    .query_map([confession_id], push_event_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(events)
            })
            .await?;

        Ok(events)
    }

    /// Record a successful delivery
    pub async fn mark_push_delivered(&self, event_id: i64) -> RepoResult<()> {
        self.finish_push_event(event_id, PushEventStatus::Delivered, None)
            .await
    }

    /// Record a failed delivery; the event is not retried
    pub async fn mark_push_failed(&self, event_id: i64, error: &str) -> RepoResult<()> {
        self.finish_push_event(event_id, PushEventStatus::Failed, Some(error.to_string()))
            .await
    }

    /// Delete delivered and failed events processed more than `older_than` ago
    ///
    /// Pending events are never removed.
    pub async fn prune_push_events(&self, older_than: Duration) -> RepoResult<usize> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| ConfessionError::Validation(format!("retention out of range: {}", e)))?;
        let cutoff = timestamp_at(chrono::Utc::now() - age);

        let removed = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM push_outbox WHERE status != ?1 AND processed_at < ?2",
                    params![PushEventStatus::Pending.to_string(), cutoff],
                )?)
            })
            .await?;

        if removed > 0 {
            debug!("Pruned {} processed push events", removed);
        }
        Ok(removed)
    }

    async fn finish_push_event(
        &self,
        event_id: i64,
        status: PushEventStatus,
        error: Option<String>,
    ) -> RepoResult<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE push_outbox SET status = ?1, last_error = ?2, processed_at = ?3 WHERE id = ?4",
                    params![status.to_string(), error, now_timestamp(), event_id],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}

fn confession_from_row(row: &Row<'_>) -> rusqlite::Result<Confession> {
    Ok(Confession {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        deleted_at: row.get(3)?,
        content: row.get(4)?,
        sender: row.get(5)?,
        push_id: row.get(6)?,
        status: row.get(7)?,
        approver: row.get(8)?,
        reason: row.get(9)?,
        cfs_id: row.get(10)?,
    })
}

fn push_event_from_row(row: &Row<'_>) -> rusqlite::Result<PushEventRecord> {
    Ok(PushEventRecord {
        id: row.get(0)?,
        confession_id: row.get(1)?,
        kind: parse_text_column(row, 2)?,
        push_id: row.get(3)?,
        payload: row.get(4)?,
        status: parse_text_column(row, 5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        processed_at: row.get(8)?,
    })
}

fn parse_text_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    row.get::<_, String>(index)?
        .parse()
        .map_err(|e: anyhow::Error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.into()))
}

/// Build a `LIKE` pattern matching `keyword` anywhere, with wildcards escaped
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
