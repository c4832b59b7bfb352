/*!
 * Confession moderation workflow.
 *
 * The `ModerationManager` is the entry point used by the CLI and by any
 * outer surface: it validates input, runs the store operations and keeps
 * the read cache coherent with writes.
 */

pub mod manager;

pub use manager::{CachedView, ModerationManager};
