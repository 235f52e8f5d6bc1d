//! Durable local state for the Updraft SDK: skip budgets, popup timestamps,
//! and seen posts, persisted per storage namespace and safe under concurrent
//! check cycles.

mod skip;
mod store;

pub use skip::SkipAttemptPolicy;
pub use store::{StorageError, UpdateStateStore};
