use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use updraft_core::{AppIdentity, ChannelDescriptor, SemanticVersion, UpdateState, UpdateType};
use updraft_platform::AppPaths;
use updraft_store::{SkipAttemptPolicy, UpdateStateStore};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::config::SdkConfig;
use crate::error::Error;
use crate::logging;
use crate::transport::{HttpTransport, Transport};

/// The SDK handle. One `Client` per configured app; its lifecycle is explicit
/// (construct, use, drop) rather than a process-global singleton, so tests and
/// multi-app hosts can run several side by side.
pub struct Client {
    config: SdkConfig,
    transport: Arc<dyn Transport>,
    store: Arc<UpdateStateStore>,
    skip_policy: SkipAttemptPolicy,
    analytics: Option<Arc<dyn AnalyticsSink>>,
}

impl Client {
    /// Build a client with the default HTTP transport and the platform state
    /// store for the configured namespace.
    ///
    /// # Errors
    /// Returns an error when platform paths cannot be resolved or the HTTP
    /// client cannot be constructed.
    pub fn new(config: SdkConfig) -> Result<Self, Error> {
        let paths = AppPaths::for_namespace(&config.namespace())?;
        if let Err(error) = paths.ensure_dirs() {
            // Reads degrade to defaults; writes will surface their own errors.
            warn!("failed to create state directories: {error}");
        }
        let store = Arc::new(UpdateStateStore::open(paths.state_file()));
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(
            config.fetch_timeout_secs,
        ))?);
        Ok(Self::with_parts(config, transport, store))
    }

    /// Build a client from explicit collaborators. This is the seam tests and
    /// embedders with their own transport or storage location use.
    #[must_use]
    pub fn with_parts(
        config: SdkConfig,
        transport: Arc<dyn Transport>,
        store: Arc<UpdateStateStore>,
    ) -> Self {
        if config.debug_logging {
            logging::init_logging(
                &config.namespace(),
                true,
                logging::DEFAULT_MAX_LOG_SIZE_BYTES,
            );
        }
        let skip_policy =
            SkipAttemptPolicy::new(Arc::clone(&store), config.refresh_interval_on_skip);
        Self {
            config,
            transport,
            store,
            skip_policy,
            analytics: None,
        }
    }

    pub fn attach_analytics(&mut self, sink: Arc<dyn AnalyticsSink>) {
        self.analytics = Some(sink);
    }

    #[must_use]
    pub fn store(&self) -> &Arc<UpdateStateStore> {
        &self.store
    }

    /// Fetch the channel descriptor and compute what update UI should be
    /// shown right now.
    ///
    /// Idempotent apart from bookkeeping: repeated calls mutate nothing but
    /// the last-known app version. Skip budgets only change through
    /// [`Client::register_skip`].
    ///
    /// # Errors
    /// Returns a typed error when the fetch fails or the descriptor does not
    /// decode; the caller should render no update UI in that case and retry
    /// on its own schedule.
    pub async fn check_for_updates(&self, identity: &AppIdentity) -> Result<UpdateState, Error> {
        let url = self.config.descriptor_url();
        debug!("checking channel at {url}");

        let document = self.transport.fetch_channel_document(&url).await?;
        let descriptor = ChannelDescriptor::from_document(document)?;

        let version_key = version_key(&identity.version_name);
        if descriptor.update_type == UpdateType::Forced {
            // First observation of this version's budget; no-op afterwards.
            if let Err(error) =
                self.store
                    .initialize_skip_attempts(&version_key, descriptor.skip_attempts)
            {
                warn!("failed to persist initial skip budget: {error}");
            }
        }

        let snapshot = self.store.snapshot(&version_key);
        let state = updraft_core::evaluate(identity, &descriptor, &snapshot, Utc::now());

        self.record_known_version(identity);
        self.emit(AnalyticsEvent::update_checked(
            &descriptor.channel,
            state.is_update_available,
        ));
        if state.is_update_available {
            self.emit(AnalyticsEvent::update_available(&state.latest_version_name));
        }

        Ok(state)
    }

    /// Tell the SDK a popup from this [`UpdateState`] was actually presented,
    /// starting the interval throttle. Storage failure here only weakens
    /// throttling, so it is logged and swallowed.
    pub fn notify_popup_shown(&self, state: &UpdateState) {
        let version_key = version_key(&state.current_version_name);
        if let Err(error) = self.store.record_popup_shown(&version_key, Utc::now()) {
            warn!("failed to persist popup timestamp: {error}");
        }
        self.emit(AnalyticsEvent::update_prompt_shown(
            &state.latest_version_name,
            state.update_type,
        ));
    }

    /// Apply one user skip action. `observed_remaining` is the budget the UI
    /// rendered, which makes a double-tap resolve to a single decrement.
    /// Returns the budget now in effect.
    ///
    /// # Errors
    /// Returns an error when the decrement cannot be persisted; the skip did
    /// not happen and the popup should stay up.
    pub fn register_skip(
        &self,
        identity: &AppIdentity,
        observed_remaining: u32,
    ) -> Result<u32, Error> {
        let version_key = version_key(&identity.version_name);
        let remaining =
            self.skip_policy
                .register_skip(&version_key, observed_remaining, Utc::now())?;
        self.emit(AnalyticsEvent::update_skipped(
            &identity.version_name,
            remaining,
        ));
        Ok(remaining)
    }

    /// No state change; the caller is about to hand off to the store page.
    pub fn notify_update_clicked(&self, state: &UpdateState) {
        self.emit(AnalyticsEvent::update_clicked(&state.latest_version_name));
    }

    /// Mark an informational post as opened. Global across versions.
    ///
    /// # Errors
    /// Returns an error when the mark cannot be persisted.
    pub fn mark_post_seen(&self, post_id: &str) -> Result<(), Error> {
        if self.store.mark_post_seen(post_id)? {
            self.emit(AnalyticsEvent::post_opened(post_id));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_post_seen(&self, post_id: &str) -> bool {
        self.store.is_post_seen(post_id)
    }

    /// Drop all locally stored update state.
    ///
    /// # Errors
    /// Returns an error when the cleared state cannot be persisted.
    pub fn clear_state(&self) -> Result<(), Error> {
        Ok(self.store.clear_all()?)
    }

    /// Drop the stored state for one app version.
    ///
    /// # Errors
    /// Returns an error when the removal cannot be persisted.
    pub fn clear_version_state(&self, version_name: &str) -> Result<(), Error> {
        Ok(self.store.clear_version(&version_key(version_name))?)
    }

    fn record_known_version(&self, identity: &AppIdentity) {
        match self.store.record_known_version(&identity.version_name) {
            Ok(Some(previous)) if previous != identity.version_name => {
                self.emit(AnalyticsEvent::app_updated(
                    &previous,
                    &identity.version_name,
                ));
            }
            Ok(_) => {}
            Err(error) => warn!("failed to persist last known version: {error}"),
        }
    }

    fn emit(&self, event: AnalyticsEvent) {
        if let Some(sink) = &self.analytics {
            sink.record_event(event);
        }
    }
}

/// Storage key for a version string: the comparable form when it parses
/// (build metadata stripped), the trimmed raw string otherwise so unparseable
/// versions still get consistent state.
fn version_key(version_name: &str) -> String {
    SemanticVersion::parse(version_name).map_or_else(
        |_| version_name.trim().to_string(),
        |version| version.comparable(),
    )
}
