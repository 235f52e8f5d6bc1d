use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::channel::{ChannelDescriptor, UpdateType};
use crate::version::SemanticVersion;

/// The caller's current app identity, as reported by its own build metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub version_code: String,
    pub version_name: String,
}

impl AppIdentity {
    #[must_use]
    pub fn new(version_code: impl Into<String>, version_name: impl Into<String>) -> Self {
        Self {
            version_code: version_code.into(),
            version_name: version_name.into(),
        }
    }
}

/// Read-only view of the locally persisted state for one version key. The
/// engine never mutates state; the store owns it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStateSnapshot {
    /// `None` until the skip budget has been initialized for this version.
    pub remaining_skip_attempts: Option<u32>,
    pub last_popup_shown_at: Option<DateTime<Utc>>,
}

/// What the caller should render after one update check. Recomputed fresh on
/// every check and never persisted.
#[derive(Debug, Clone)]
pub struct UpdateState {
    pub update_type: UpdateType,
    pub should_show_badge: bool,
    pub should_show_popup: bool,
    pub should_show_update_button: bool,
    pub remaining_skip_attempts: u32,
    pub channel: ChannelDescriptor,
    pub badge_url: Option<String>,
    pub update_url: Option<String>,
    pub current_version_code: String,
    pub latest_version_code: String,
    pub current_version_name: String,
    pub latest_version_name: String,
    pub is_update_available: bool,
}

/// The popup throttling rule shared by the engine and the store: eligible when
/// the interval is zero, nothing was ever shown, or the interval has elapsed.
#[must_use]
pub fn popup_due(
    interval_minutes: u64,
    last_shown_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if interval_minutes == 0 {
        return true;
    }
    let Some(shown_at) = last_shown_at else {
        return true;
    };
    let interval = Duration::minutes(i64::try_from(interval_minutes).unwrap_or(i64::MAX));
    now.signed_duration_since(shown_at) >= interval
}

/// Compute the [`UpdateState`] for one check. Pure: no I/O, no clock access,
/// safe to call concurrently.
///
/// An unparseable version on either side makes `is_update_available` false
/// (an unknown baseline never claims an update) while the descriptor fields
/// are still surfaced.
#[must_use]
pub fn evaluate(
    identity: &AppIdentity,
    descriptor: &ChannelDescriptor,
    local: &LocalStateSnapshot,
    now: DateTime<Utc>,
) -> UpdateState {
    let is_update_available =
        is_newer_remote(&identity.version_name, &descriptor.current_version_name);
    let due = popup_due(
        descriptor.show_interval_minutes,
        local.last_popup_shown_at,
        now,
    );

    let mut should_show_badge = false;
    let mut should_show_popup = false;
    let mut should_show_update_button = false;
    let mut remaining_skip_attempts = 0;

    match descriptor.update_type {
        UpdateType::None => should_show_badge = is_update_available,
        UpdateType::Available => should_show_update_button = is_update_available,
        UpdateType::Flexible => should_show_popup = is_update_available && due,
        UpdateType::Forced => {
            // Before the first initialization the descriptor's budget is the
            // value in effect.
            remaining_skip_attempts = local
                .remaining_skip_attempts
                .unwrap_or(descriptor.skip_attempts);
            should_show_popup = is_update_available && (remaining_skip_attempts > 0 || due);
        }
    }

    debug!(
        "evaluated channel {}: type={:?} available={is_update_available} popup={should_show_popup}",
        descriptor.channel, descriptor.update_type
    );

    UpdateState {
        update_type: descriptor.update_type,
        should_show_badge,
        should_show_popup,
        should_show_update_button,
        remaining_skip_attempts,
        badge_url: descriptor.badge_url().map(str::to_string),
        update_url: descriptor.update_url().map(str::to_string),
        current_version_code: identity.version_code.clone(),
        latest_version_code: descriptor.current_version_code.clone(),
        current_version_name: identity.version_name.clone(),
        latest_version_name: descriptor.current_version_name.clone(),
        is_update_available,
        channel: descriptor.clone(),
    }
}

fn is_newer_remote(local: &str, remote: &str) -> bool {
    match (SemanticVersion::parse(local), SemanticVersion::parse(remote)) {
        (Ok(local), Ok(remote)) => remote > local,
        _ => false,
    }
}
