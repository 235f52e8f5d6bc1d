use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to decode channel descriptor: {details}")]
    InvalidResponse { details: String },
}

impl From<serde_json::Error> for DescriptorError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse {
            details: error.to_string(),
        }
    }
}

/// Policy code controlling how strongly the user is prompted to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateType {
    /// No prompt; an update, when available, is only badge-eligible.
    None = 0,
    /// Show an update affordance, never a popup.
    Available = 1,
    /// Closable popup; the user may dismiss and continue.
    Flexible = 2,
    /// Forced popup with a finite skip budget.
    Forced = 3,
}

impl UpdateType {
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for UpdateType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Available),
            2 => Ok(Self::Flexible),
            3 => Ok(Self::Forced),
            other => Err(other),
        }
    }
}

impl Serialize for UpdateType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for UpdateType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Self::try_from(code)
            .map_err(|other| serde::de::Error::custom(format!("unknown update type code {other}")))
    }
}

/// The remote channel document, validated. Re-fetched on every check; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDescriptor {
    pub channel: String,
    pub current_version_code: String,
    pub current_version_name: String,
    #[serde(default)]
    pub app_deeplink: Option<String>,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub post_url: Option<String>,
    #[serde(default)]
    pub posts_url: Option<String>,
    pub update_type: UpdateType,
    pub update_message: String,
    #[serde(default)]
    pub skip_attempts: u32,
    #[serde(default)]
    pub show_interval_minutes: u64,
}

impl ChannelDescriptor {
    /// Decode and validate a raw channel document.
    ///
    /// Missing optional fields decode to `None`; a missing required field or
    /// an out-of-range `updateType` fails the whole parse. Never panics on
    /// malformed input.
    ///
    /// # Errors
    /// Returns [`DescriptorError::InvalidResponse`] when the document does not
    /// decode into a valid descriptor.
    pub fn from_document(document: serde_json::Value) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_value(document)?)
    }

    /// Where the badge should link: the single post when present, otherwise
    /// the posts feed.
    #[must_use]
    pub fn badge_url(&self) -> Option<&str> {
        self.post_url.as_deref().or(self.posts_url.as_deref())
    }

    /// Where the update action should lead: the store page when present,
    /// otherwise the deeplink.
    #[must_use]
    pub fn update_url(&self) -> Option<&str> {
        self.app_url.as_deref().or(self.app_deeplink.as_deref())
    }
}
