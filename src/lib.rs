/*!
 * # Confessions - moderation backend for anonymous confessions
 *
 * Users submit anonymous text confessions, moderators approve or reject
 * them, and approved confessions receive a sequential public number and a
 * push notification.
 *
 * ## Features
 *
 * - SQLite store with soft delete and a versioned schema
 * - Atomic approve/reject transitions with store-enforced public numbers
 * - Push notifications queued in an outbox and delivered separately
 * - In-process read cache with per-entry expiration and a janitor task
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `cache`: Time-expiring key/value cache
 * - `database`: SQLite persistence:
 *   - `database::connection`: Connection handling
 *   - `database::schema`: Tables, indexes and migrations
 *   - `database::models`: Confession and outbox records
 *   - `database::repository`: Store operations
 * - `moderation`: The moderation workflow with cached reads
 * - `push`: Push notification delivery:
 *   - `push::fcm`: Firebase Cloud Messaging client
 *   - `push::dispatcher`: Outbox dispatcher
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
// Add other lints you want to allow but not auto-fix

// Public modules
pub mod app_config;
pub mod cache;
pub mod database;
pub mod moderation;
pub mod push;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use cache::{default_expiration, Expiration, TtlCache};
pub use database::{Confession, ConfessionStatus, Overview, Repository};
pub use moderation::ModerationManager;
pub use push::{FcmNotifier, PushDispatcher, PushNotifier};
pub use errors::{AppError, ConfessionError, PushError};
