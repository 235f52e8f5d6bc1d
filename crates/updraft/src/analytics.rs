use std::collections::HashMap;

use log::debug;
use updraft_core::UpdateType;

/// A named SDK event with a flat string property map.
#[derive(Debug, Clone)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    pub properties: HashMap<String, String>,
}

impl AnalyticsEvent {
    fn new(name: &'static str, properties: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        Self {
            name,
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }

    #[must_use]
    pub fn update_checked(channel: &str, is_update_available: bool) -> Self {
        Self::new(
            "update_checked",
            [
                ("channel", channel.to_string()),
                ("update_available", is_update_available.to_string()),
            ],
        )
    }

    #[must_use]
    pub fn update_available(latest_version: &str) -> Self {
        Self::new(
            "update_available",
            [("latest_version", latest_version.to_string())],
        )
    }

    #[must_use]
    pub fn update_prompt_shown(version: &str, update_type: UpdateType) -> Self {
        Self::new(
            "update_prompt_shown",
            [
                ("version", version.to_string()),
                ("update_type", update_type.code().to_string()),
            ],
        )
    }

    #[must_use]
    pub fn update_clicked(latest_version: &str) -> Self {
        Self::new(
            "update_clicked",
            [("latest_version", latest_version.to_string())],
        )
    }

    #[must_use]
    pub fn update_skipped(version: &str, remaining: u32) -> Self {
        Self::new(
            "update_skipped",
            [
                ("version", version.to_string()),
                ("remaining_skip_attempts", remaining.to_string()),
            ],
        )
    }

    #[must_use]
    pub fn post_opened(post_id: &str) -> Self {
        Self::new("post_opened", [("post_id", post_id.to_string())])
    }

    #[must_use]
    pub fn app_updated(previous_version: &str, current_version: &str) -> Self {
        Self::new(
            "app_updated",
            [
                ("previous_version", previous_version.to_string()),
                ("current_version", current_version.to_string()),
            ],
        )
    }
}

/// Fire-and-forget event sink. Implementations must swallow their own
/// failures; nothing a sink does can affect the decision path.
pub trait AnalyticsSink: Send + Sync {
    fn record_event(&self, event: AnalyticsEvent);
}

/// Reference sink that forwards events to the `log` facade.
pub struct LogSink;

impl AnalyticsSink for LogSink {
    fn record_event(&self, event: AnalyticsEvent) {
        debug!("analytics {}: {:?}", event.name, event.properties);
    }
}
