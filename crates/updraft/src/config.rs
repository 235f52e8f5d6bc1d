use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// The application key the channel endpoint is keyed by.
    pub app_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Overrides the directory namespace local state is stored under.
    #[serde(default)]
    pub storage_namespace: Option<String>,

    #[serde(default)]
    pub debug_logging: bool,

    /// When set, a successful skip also restarts the popup interval throttle.
    #[serde(default)]
    pub refresh_interval_on_skip: bool,
}

fn default_base_url() -> String {
    "https://channels.updraft.dev/v1".to_string()
}

fn default_channel() -> String {
    "stable".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

impl SdkConfig {
    #[must_use]
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            base_url: default_base_url(),
            channel: default_channel(),
            fetch_timeout_secs: default_fetch_timeout(),
            storage_namespace: None,
            debug_logging: false,
            refresh_interval_on_skip: false,
        }
    }

    /// The URL the channel descriptor for this app is fetched from.
    #[must_use]
    pub fn descriptor_url(&self) -> String {
        format!(
            "{}/apps/{}/channels/{}.json",
            self.base_url.trim_end_matches('/'),
            self.app_key,
            self.channel
        )
    }

    /// The storage namespace local state lives under, derived from the app
    /// key unless overridden.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.storage_namespace
            .clone()
            .unwrap_or_else(|| format!("updraft-{}", self.app_key))
    }
}
