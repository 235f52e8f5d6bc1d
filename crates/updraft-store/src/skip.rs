use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::store::{StorageError, UpdateStateStore};

/// Skip-budget policy for forced updates: decrement, floor at zero, persist,
/// return the new value, at most once per logical skip action.
///
/// A skip goes through a compare-and-swap against the budget the caller's UI
/// was rendered from, so a double-tapped skip button resolves to a single
/// decrement: the second tap observes a stale value and returns the stored
/// one unchanged.
pub struct SkipAttemptPolicy {
    store: Arc<UpdateStateStore>,
    refresh_interval_on_skip: bool,
}

impl SkipAttemptPolicy {
    #[must_use]
    pub fn new(store: Arc<UpdateStateStore>, refresh_interval_on_skip: bool) -> Self {
        Self {
            store,
            refresh_interval_on_skip,
        }
    }

    /// Apply one user skip action for the given version key.
    ///
    /// `observed_remaining` is the budget the caller's UI was rendered from.
    /// When `refresh_interval_on_skip` is set, a successful decrement also
    /// stamps the popup timestamp so the interval throttle restarts from the
    /// skip.
    ///
    /// # Errors
    /// Returns an error when a performed decrement cannot be persisted.
    pub fn register_skip(
        &self,
        version: &str,
        observed_remaining: u32,
        now: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let stamp = self.refresh_interval_on_skip.then_some(now);
        let remaining = self
            .store
            .decrement_if_current(version, observed_remaining, stamp)?;
        debug!("skip registered for {version}: {remaining} attempts remaining");
        Ok(remaining)
    }
}
