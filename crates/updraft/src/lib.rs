//! Updraft: a client-side update-notification SDK.
//!
//! The embedding app hands Updraft its current version, Updraft fetches the
//! remote channel descriptor, combines it with durable local state (skip
//! budgets, popup timestamps, seen posts), and returns an [`UpdateState`]
//! describing exactly which update UI to show. Rendering, scheduling, and
//! event delivery stay with the caller.
//!
//! ```no_run
//! use updraft::{AppIdentity, Client, SdkConfig};
//!
//! # async fn check() -> Result<(), updraft::Error> {
//! let client = Client::new(SdkConfig::new("my-app-key"))?;
//! let identity = AppIdentity::new("190", "1.9.0");
//! let state = client.check_for_updates(&identity).await?;
//! if state.should_show_popup {
//!     // render the popup, then on user action:
//!     client.notify_popup_shown(&state);
//! }
//! # Ok(())
//! # }
//! ```

mod analytics;
mod client;
mod config;
mod error;
pub mod logging;
mod transport;

pub use analytics::{AnalyticsEvent, AnalyticsSink, LogSink};
pub use client::Client;
pub use config::SdkConfig;
pub use error::Error;
pub use transport::{HttpTransport, Transport, TransportError};

pub use updraft_core::{
    AppIdentity, ChannelDescriptor, DescriptorError, InvalidVersionFormat, LocalStateSnapshot,
    SemanticVersion, UpdateState, UpdateType, VersionComponent, evaluate, popup_due,
};
pub use updraft_platform::{AppPaths, AppPathsError};
pub use updraft_store::{SkipAttemptPolicy, StorageError, UpdateStateStore};
