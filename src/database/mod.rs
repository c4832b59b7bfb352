/*!
 * Database module for persistent storage of confessions.
 *
 * This module provides SQLite-based persistence for:
 * - Confessions and their moderation state, with soft delete
 * - The push outbox filled by moderation transitions
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{Confession, ConfessionStatus, Overview, PushEventKind, PushEventRecord, PushEventStatus};
pub use repository::{Repository, SEARCH_LIMIT};
