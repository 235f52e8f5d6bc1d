use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use updraft_core::{LocalStateSnapshot, popup_due};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode update state: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StorageError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VersionRecord {
    #[serde(default)]
    remaining_skip_attempts: Option<u32>,
    #[serde(default)]
    last_popup_shown_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    versions: BTreeMap<String, VersionRecord>,
    #[serde(default)]
    seen_post_ids: BTreeSet<String>,
    #[serde(default)]
    last_popup_version: Option<String>,
    #[serde(default)]
    last_known_version: Option<String>,
}

/// Durable update state, one JSON document per storage namespace.
///
/// All writes go through a single mutex and land on disk atomically before
/// the mutation returns, so decisions stay consistent across concurrent check
/// cycles and process restarts. A missing or corrupt state file degrades to
/// the empty state; explicit mutations surface their I/O failures.
pub struct UpdateStateStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl UpdateStateStore {
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load_from_path(&path);
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    fn load_from_path(path: &Path) -> StoreData {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return StoreData::default();
        };
        match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(error) => {
                warn!(
                    "discarding unreadable update state at {}: {error}",
                    path.display()
                );
                StoreData::default()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-only view of the stored state for one version key.
    #[must_use]
    pub fn snapshot(&self, version: &str) -> LocalStateSnapshot {
        let data = self.lock();
        data.versions
            .get(version)
            .map(|record| LocalStateSnapshot {
                remaining_skip_attempts: record.remaining_skip_attempts,
                last_popup_shown_at: record.last_popup_shown_at,
            })
            .unwrap_or_default()
    }

    /// The skip budget currently in effect for this version key, 0 when never
    /// initialized.
    #[must_use]
    pub fn remaining_skip_attempts(&self, version: &str) -> u32 {
        self.lock()
            .versions
            .get(version)
            .and_then(|record| record.remaining_skip_attempts)
            .unwrap_or(0)
    }

    /// Set the skip budget for a version key, first write wins. Re-sending the
    /// same (or any) budget for an already-initialized key is a no-op, so the
    /// server cannot hand skips back on a later poll. Returns the budget in
    /// effect.
    ///
    /// # Errors
    /// Returns an error when persisting the first write fails.
    pub fn initialize_skip_attempts(
        &self,
        version: &str,
        budget: u32,
    ) -> Result<u32, StorageError> {
        let mut data = self.lock();
        let record = data.versions.entry(version.to_string()).or_default();
        if let Some(existing) = record.remaining_skip_attempts {
            return Ok(existing);
        }
        record.remaining_skip_attempts = Some(budget);
        self.persist(&data)?;
        Ok(budget)
    }

    /// Decrement the skip budget for a version key, flooring at 0. Persists
    /// before returning the new value.
    ///
    /// # Errors
    /// Returns an error when the decrement cannot be persisted; the in-memory
    /// state is rolled back so a retry observes the old value.
    pub fn decrement_skip_attempts(&self, version: &str) -> Result<u32, StorageError> {
        let mut data = self.lock();
        let record = data.versions.entry(version.to_string()).or_default();
        let previous = record.remaining_skip_attempts;
        let next = previous.unwrap_or(0).saturating_sub(1);
        record.remaining_skip_attempts = Some(next);
        if let Err(error) = self.persist(&data) {
            if let Some(record) = data.versions.get_mut(version) {
                record.remaining_skip_attempts = previous;
            }
            return Err(error);
        }
        Ok(next)
    }

    /// Compare-and-swap decrement used by the skip policy: only decrements
    /// when the stored budget still equals `observed`, so a double-tapped skip
    /// lands at most once. Optionally stamps the popup timestamp in the same
    /// critical section. Returns the budget now in effect.
    ///
    /// # Errors
    /// Returns an error when a performed decrement cannot be persisted.
    pub(crate) fn decrement_if_current(
        &self,
        version: &str,
        observed: u32,
        stamp_shown_at: Option<DateTime<Utc>>,
    ) -> Result<u32, StorageError> {
        let mut data = self.lock();
        let record = data.versions.entry(version.to_string()).or_default();
        let current = record.remaining_skip_attempts.unwrap_or(0);
        if current != observed {
            return Ok(current);
        }
        let next = current.saturating_sub(1);
        record.remaining_skip_attempts = Some(next);
        if let Some(at) = stamp_shown_at {
            record.last_popup_shown_at = Some(at);
            data.last_popup_version = Some(version.to_string());
        }
        self.persist(&data)?;
        Ok(next)
    }

    /// The popup throttling contract: true when the interval is 0, nothing was
    /// ever shown for this version, or the interval has elapsed since then.
    #[must_use]
    pub fn should_show_popup(
        &self,
        interval_minutes: u64,
        version: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let last_shown_at = self
            .lock()
            .versions
            .get(version)
            .and_then(|record| record.last_popup_shown_at);
        popup_due(interval_minutes, last_shown_at, now)
    }

    /// Record that a popup was presented for this version.
    ///
    /// # Errors
    /// Returns an error when the timestamp cannot be persisted.
    pub fn record_popup_shown(
        &self,
        version: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut data = self.lock();
        data.versions
            .entry(version.to_string())
            .or_default()
            .last_popup_shown_at = Some(at);
        data.last_popup_version = Some(version.to_string());
        self.persist(&data)
    }

    /// The version a popup was most recently recorded for, across all keys.
    #[must_use]
    pub fn last_popup_version(&self) -> Option<String> {
        self.lock().last_popup_version.clone()
    }

    #[must_use]
    pub fn is_post_seen(&self, post_id: &str) -> bool {
        self.lock().seen_post_ids.contains(post_id)
    }

    /// Mark a post as seen. The set is global, never version-scoped: a post,
    /// once opened, stays opened across version bumps. Returns whether the id
    /// was newly marked.
    ///
    /// # Errors
    /// Returns an error when the mark cannot be persisted.
    pub fn mark_post_seen(&self, post_id: &str) -> Result<bool, StorageError> {
        let mut data = self.lock();
        if !data.seen_post_ids.insert(post_id.to_string()) {
            return Ok(false);
        }
        self.persist(&data)?;
        Ok(true)
    }

    #[must_use]
    pub fn last_known_version(&self) -> Option<String> {
        self.lock().last_known_version.clone()
    }

    /// Record the version the app is currently running, returning the
    /// previously recorded one so callers can detect upgrades. Only persists
    /// when the value actually changed.
    ///
    /// # Errors
    /// Returns an error when a changed value cannot be persisted.
    pub fn record_known_version(&self, version: &str) -> Result<Option<String>, StorageError> {
        let mut data = self.lock();
        if data.last_known_version.as_deref() == Some(version) {
            return Ok(data.last_known_version.clone());
        }
        let previous = data.last_known_version.replace(version.to_string());
        self.persist(&data)?;
        Ok(previous)
    }

    /// Drop all stored state for every version.
    ///
    /// # Errors
    /// Returns an error when the cleared state cannot be persisted; callers
    /// are expected to react rather than assume the clear happened.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let mut data = self.lock();
        *data = StoreData::default();
        self.persist(&data)
    }

    /// Drop the stored state for one version key, leaving every other key
    /// untouched.
    ///
    /// # Errors
    /// Returns an error when the removal cannot be persisted.
    pub fn clear_version(&self, version: &str) -> Result<(), StorageError> {
        let mut data = self.lock();
        data.versions.remove(version);
        self.persist(&data)
    }

    fn persist(&self, data: &StoreData) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| StorageError::io("failed to create state directory", error))?;
        }
        let encoded = serde_json::to_vec_pretty(data).map_err(StorageError::Encode)?;
        write_atomic(&self.path, &encoded)
            .map_err(|error| StorageError::io("failed to write state file", error))
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "state path has no parent")
    })?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("state");
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let pid = std::process::id();

    let mut tmp_path = None;
    for attempt in 0..16_u8 {
        let candidate = parent.join(format!(".{file_name}.{pid}.{timestamp}.{attempt}.tmp"));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(data)?;
                file.sync_all()?;
                tmp_path = Some(candidate);
                break;
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    let Some(tmp_path) = tmp_path else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "failed to create unique state temp file",
        ));
    };

    if let Err(error) = replace_file(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(error);
    }

    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn replace_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::rename(src, dst)
}

#[cfg(target_os = "windows")]
fn replace_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    // Windows rename refuses to replace an existing file.
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::remove_file(dst)?;
            std::fs::rename(src, dst)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::UpdateStateStore;

    fn store_in(dir: &tempfile::TempDir) -> UpdateStateStore {
        UpdateStateStore::open(dir.path().join("update-state.json"))
    }

    #[test]
    fn remaining_skip_attempts_defaults_to_zero() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        assert_eq!(store.remaining_skip_attempts("1.0.0"), 0);
    }

    #[test]
    fn initialize_skip_attempts_is_first_write_wins() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        assert_eq!(
            store
                .initialize_skip_attempts("1.0.0", 3)
                .expect("initialize should persist"),
            3
        );
        assert_eq!(
            store
                .initialize_skip_attempts("1.0.0", 9)
                .expect("repeat initialize should be a no-op"),
            3
        );
        assert_eq!(store.remaining_skip_attempts("1.0.0"), 3);
    }

    #[test]
    fn initialize_after_decrement_does_not_restore_budget() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        store
            .initialize_skip_attempts("1.0.0", 2)
            .expect("initialize should persist");
        store
            .decrement_skip_attempts("1.0.0")
            .expect("decrement should persist");

        assert_eq!(
            store
                .initialize_skip_attempts("1.0.0", 2)
                .expect("re-initialize should be a no-op"),
            1
        );
    }

    #[test]
    fn budgets_are_isolated_per_version_key() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        store
            .initialize_skip_attempts("1.0.0", 2)
            .expect("initialize should persist");
        store
            .decrement_skip_attempts("1.0.0")
            .expect("decrement should persist");
        store
            .initialize_skip_attempts("1.1.0", 2)
            .expect("initialize for new version should persist");

        assert_eq!(store.remaining_skip_attempts("1.0.0"), 1);
        assert_eq!(store.remaining_skip_attempts("1.1.0"), 2);
    }

    #[test]
    fn decrement_floors_at_zero() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        store
            .initialize_skip_attempts("1.0.0", 1)
            .expect("initialize should persist");

        assert_eq!(
            store
                .decrement_skip_attempts("1.0.0")
                .expect("decrement should persist"),
            0
        );
        assert_eq!(
            store
                .decrement_skip_attempts("1.0.0")
                .expect("decrement at zero should persist"),
            0
        );
        assert_eq!(store.remaining_skip_attempts("1.0.0"), 0);
    }

    #[test]
    fn should_show_popup_honors_interval() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);
        let now = Utc::now();

        assert!(store.should_show_popup(60, "1.0.0", now));

        store
            .record_popup_shown("1.0.0", now - Duration::minutes(10))
            .expect("record should persist");
        assert!(!store.should_show_popup(60, "1.0.0", now));
        assert!(store.should_show_popup(0, "1.0.0", now));

        store
            .record_popup_shown("1.0.0", now - Duration::minutes(61))
            .expect("record should persist");
        assert!(store.should_show_popup(60, "1.0.0", now));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("update-state.json");

        {
            let store = UpdateStateStore::open(&path);
            store
                .initialize_skip_attempts("2.0.0", 2)
                .expect("initialize should persist");
            store
                .decrement_skip_attempts("2.0.0")
                .expect("decrement should persist");
            store
                .mark_post_seen("post-17")
                .expect("mark should persist");
            store
                .record_popup_shown("2.0.0", Utc::now())
                .expect("record should persist");
        }

        let reopened = UpdateStateStore::open(&path);
        assert_eq!(reopened.remaining_skip_attempts("2.0.0"), 1);
        assert!(reopened.is_post_seen("post-17"));
        assert!(!reopened.is_post_seen("post-18"));
        assert_eq!(reopened.last_popup_version(), Some("2.0.0".to_string()));
    }

    #[test]
    fn corrupt_state_file_degrades_to_empty_state() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("update-state.json");
        std::fs::write(&path, "{not-valid-json").expect("corrupt file should be written");

        let store = UpdateStateStore::open(&path);
        assert_eq!(store.remaining_skip_attempts("1.0.0"), 0);
        assert!(!store.is_post_seen("post-1"));

        // The next mutation replaces the corrupt file with valid state.
        store
            .mark_post_seen("post-1")
            .expect("mark should persist over corrupt file");
        let reopened = UpdateStateStore::open(&path);
        assert!(reopened.is_post_seen("post-1"));
    }

    #[test]
    fn mark_post_seen_reports_first_sight_only() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        assert!(store.mark_post_seen("post-1").expect("mark should persist"));
        assert!(
            !store
                .mark_post_seen("post-1")
                .expect("repeat mark should be a no-op")
        );
    }

    #[test]
    fn record_known_version_returns_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        assert_eq!(
            store
                .record_known_version("1.0.0")
                .expect("record should persist"),
            None
        );
        assert_eq!(
            store
                .record_known_version("1.0.0")
                .expect("unchanged record should be a no-op"),
            Some("1.0.0".to_string())
        );
        assert_eq!(
            store
                .record_known_version("1.1.0")
                .expect("record should persist"),
            Some("1.0.0".to_string())
        );
    }

    #[test]
    fn clear_version_leaves_other_keys_untouched() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);

        store
            .initialize_skip_attempts("1.0.0", 2)
            .expect("initialize should persist");
        store
            .initialize_skip_attempts("1.1.0", 3)
            .expect("initialize should persist");

        store
            .clear_version("1.0.0")
            .expect("clear_version should persist");

        assert_eq!(store.remaining_skip_attempts("1.0.0"), 0);
        assert_eq!(store.remaining_skip_attempts("1.1.0"), 3);
    }

    #[test]
    fn clear_all_resets_everything_durably() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("update-state.json");

        let store = UpdateStateStore::open(&path);
        store
            .initialize_skip_attempts("1.0.0", 2)
            .expect("initialize should persist");
        store.mark_post_seen("post-1").expect("mark should persist");
        store.clear_all().expect("clear_all should persist");

        let reopened = UpdateStateStore::open(&path);
        assert_eq!(reopened.remaining_skip_attempts("1.0.0"), 0);
        assert!(!reopened.is_post_seen("post-1"));
    }

    #[test]
    fn snapshot_reflects_stored_record() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = store_in(&dir);
        let shown = Utc::now() - Duration::minutes(5);

        let fresh = store.snapshot("1.0.0");
        assert!(fresh.remaining_skip_attempts.is_none());
        assert!(fresh.last_popup_shown_at.is_none());

        store
            .initialize_skip_attempts("1.0.0", 2)
            .expect("initialize should persist");
        store
            .record_popup_shown("1.0.0", shown)
            .expect("record should persist");

        let populated = store.snapshot("1.0.0");
        assert_eq!(populated.remaining_skip_attempts, Some(2));
        assert_eq!(populated.last_popup_shown_at, Some(shown));
    }
}
