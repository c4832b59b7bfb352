/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfessionError;

/// Current time as a fixed-width ISO 8601 UTC timestamp
///
/// Fixed width keeps the text order equal to the time order in SQL comparisons.
pub fn now_timestamp() -> String {
    timestamp_at(chrono::Utc::now())
}

/// Format an instant the way `now_timestamp` does
pub fn timestamp_at(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Moderation status of a confession
///
/// Stored and serialized as an integer: 0 = pending, 1 = approved,
/// 2 = rejected. Valid transitions are pending → approved, pending →
/// rejected and approved → pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ConfessionStatus {
    /// Awaiting moderation
    #[default]
    Pending,
    /// Published with a public number
    Approved,
    /// Refused by a moderator
    Rejected,
}

impl ConfessionStatus {
    /// Integer code persisted in the store
    pub fn code(self) -> i64 {
        match self {
            ConfessionStatus::Pending => 0,
            ConfessionStatus::Approved => 1,
            ConfessionStatus::Rejected => 2,
        }
    }

    /// Whether moderation may move a record from `self` to `next`
    pub fn can_transition_to(self, next: ConfessionStatus) -> bool {
        matches!(
            (self, next),
            (ConfessionStatus::Pending, ConfessionStatus::Approved)
                | (ConfessionStatus::Pending, ConfessionStatus::Rejected)
                | (ConfessionStatus::Approved, ConfessionStatus::Pending)
        )
    }
}

impl fmt::Display for ConfessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfessionStatus::Pending => write!(f, "pending"),
            ConfessionStatus::Approved => write!(f, "approved"),
            ConfessionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl From<ConfessionStatus> for i64 {
    fn from(status: ConfessionStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i64> for ConfessionStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ConfessionStatus::Pending),
            1 => Ok(ConfessionStatus::Approved),
            2 => Ok(ConfessionStatus::Rejected),
            other => Err(format!("Invalid confession status: {}", other)),
        }
    }
}

impl ToSql for ConfessionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for ConfessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        ConfessionStatus::try_from(code).map_err(|_| FromSqlError::OutOfRange(code))
    }
}

/// A submitted confession
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confession {
    /// Store-assigned key; 0 until the record is created
    pub id: i64,
    /// Creation timestamp (ISO 8601)
    pub created_at: Option<String>,
    /// Last update timestamp (ISO 8601)
    pub updated_at: Option<String>,
    /// Soft-delete tombstone; set means logically removed
    pub deleted_at: Option<String>,
    /// Confession body
    pub content: String,
    /// Opaque identifier of the submitting client
    pub sender: String,
    /// Push delivery token of the sender's device
    pub push_id: String,
    /// Moderation status
    pub status: ConfessionStatus,
    /// Moderator who actioned the record, 0 while pending
    pub approver: i64,
    /// Rejection justification, empty unless rejected
    pub reason: String,
    /// Public sequential number, 0 unless approved
    pub cfs_id: i64,
}

impl Confession {
    /// Create a new, not yet persisted, pending confession
    pub fn new(
        content: impl Into<String>,
        sender: impl Into<String>,
        push_id: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            created_at: None,
            updated_at: None,
            deleted_at: None,
            content: content.into(),
            sender: sender.into(),
            push_id: push_id.into(),
            status: ConfessionStatus::Pending,
            approver: 0,
            reason: String::new(),
            cfs_id: 0,
        }
    }

    /// True until the store has assigned a key
    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// True when the record carries a soft-delete tombstone
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Check the required text fields
    pub fn validate(&self) -> Result<(), ConfessionError> {
        if self.content.trim().is_empty() {
            return Err(ConfessionError::Validation("content must not be empty".to_string()));
        }
        if self.sender.trim().is_empty() {
            return Err(ConfessionError::Validation("sender must not be empty".to_string()));
        }
        if self.push_id.trim().is_empty() {
            return Err(ConfessionError::Validation("push id must not be empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn mark_approved(&mut self, approver: i64, cfs_id: i64) {
        self.status = ConfessionStatus::Approved;
        self.approver = approver;
        self.cfs_id = cfs_id;
    }

    pub(crate) fn mark_rejected(&mut self, approver: i64, reason: &str) {
        self.status = ConfessionStatus::Rejected;
        self.approver = approver;
        self.reason = reason.to_string();
    }

    pub(crate) fn reset_to_pending(&mut self) {
        self.status = ConfessionStatus::Pending;
        self.approver = 0;
        self.cfs_id = 0;
        self.reason.clear();
    }
}

/// Moderation queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overview {
    /// All live confessions
    pub total: i64,
    /// Confessions awaiting moderation
    pub pending: i64,
    /// Rejected confessions
    pub rejected: i64,
}

/// Reason a push notification was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEventKind {
    /// The confession was approved
    Approved,
    /// The confession was rejected
    Rejected,
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushEventKind::Approved => write!(f, "approved"),
            PushEventKind::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for PushEventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approved" => Ok(PushEventKind::Approved),
            "rejected" => Ok(PushEventKind::Rejected),
            _ => Err(anyhow::anyhow!("Invalid push event kind: {}", s)),
        }
    }
}

/// Delivery state of an outbox entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEventStatus {
    /// Waiting for the dispatcher
    Pending,
    /// Accepted by the push service
    Delivered,
    /// Delivery attempted once and failed; never retried
    Failed,
}

impl fmt::Display for PushEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushEventStatus::Pending => write!(f, "pending"),
            PushEventStatus::Delivered => write!(f, "delivered"),
            PushEventStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PushEventStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PushEventStatus::Pending),
            "delivered" => Ok(PushEventStatus::Delivered),
            "failed" => Ok(PushEventStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid push event status: {}", s)),
        }
    }
}

/// Outbox entry for a push notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEventRecord {
    /// Database ID
    pub id: i64,
    /// Confession the notification is about
    pub confession_id: i64,
    /// Transition that queued the notification
    pub kind: PushEventKind,
    /// Device token the notification targets
    pub push_id: String,
    /// Serialized push message body
    pub payload: String,
    /// Delivery state
    pub status: PushEventStatus,
    /// Error text of a failed delivery
    pub last_error: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Delivery attempt timestamp (ISO 8601)
    pub processed_at: Option<String>,
}
