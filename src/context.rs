//! Service context bundling the tracker and store trait objects.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::adapters::live::{GithubIssueTracker, YamlIssueStore};
use crate::adapters::recording::RecordingIssueTracker;
use crate::adapters::replaying::ReplayingIssueTracker;
use crate::cassette::format::Cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::replayer::CassetteReplayer;
use crate::config::Config;
use crate::error::ConfigError;
use crate::model::Token;
use crate::ports::{IssueStore, IssueTracker};
use crate::reconcile::Reconciler;

/// Bundles the two external boundaries a command needs.
///
/// Constructors wire up different tracker implementations (live, recording,
/// replaying); the store is always the one the caller points at.
pub struct ServiceContext {
    /// Remote issue tracker.
    pub tracker: Arc<dyn IssueTracker>,
    /// Owner of desired issues.
    pub store: Arc<dyn IssueStore>,
    replaying: bool,
    /// Optional cassette recorder; written to disk on drop.
    recorder: Option<Arc<Mutex<CassetteRecorder>>>,
}

impl ServiceContext {
    /// Picks live, recording or replaying wiring from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the replay
    /// cassette cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        match (&config.record, &config.replay) {
            (_, Some(path)) => Self::replaying(config, path),
            (Some(path), None) => Self::recording(config, path),
            (None, None) => Self::live(config),
        }
    }

    /// Talks to GitHub directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn live(config: &Config) -> Result<Self, String> {
        let tracker = GithubIssueTracker::new(&config.api_url, config.call_timeout)
            .map_err(|e| e.to_string())?;
        Ok(Self::with_adapters(Arc::new(tracker), Self::yaml_store(config)))
    }

    /// Talks to GitHub and records every call into a cassette at `path`,
    /// written when the context is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn recording(config: &Config, path: &Path) -> Result<Self, String> {
        let live = GithubIssueTracker::new(&config.api_url, config.call_timeout)
            .map_err(|e| e.to_string())?;
        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::new(path, "issue-sync", config.api_url.clone())));
        let tracker = RecordingIssueTracker::new(Arc::new(live), Arc::clone(&recorder));
        info!(cassette = %path.display(), "recording tracker calls");
        Ok(Self {
            tracker: Arc::new(tracker),
            store: Self::yaml_store(config),
            replaying: false,
            recorder: Some(recorder),
        })
    }

    /// Serves tracker calls from the cassette at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be read or parsed.
    pub fn replaying(config: &Config, path: &Path) -> Result<Self, String> {
        let cassette = Cassette::load(path).map_err(|e| e.to_string())?;
        info!(
            cassette = %path.display(),
            interactions = cassette.interactions.len(),
            "replaying tracker calls"
        );
        let tracker = ReplayingIssueTracker::new(CassetteReplayer::new(&cassette));
        Ok(Self {
            tracker: Arc::new(tracker),
            store: Self::yaml_store(config),
            replaying: true,
            recorder: None,
        })
    }

    /// Uses the given adapters as-is.
    #[must_use]
    pub fn with_adapters(tracker: Arc<dyn IssueTracker>, store: Arc<dyn IssueStore>) -> Self {
        Self {
            tracker,
            store,
            replaying: false,
            recorder: None,
        }
    }

    fn yaml_store(config: &Config) -> Arc<dyn IssueStore> {
        Arc::new(YamlIssueStore::new(&config.store_dir))
    }

    /// The credential to call the tracker with.
    ///
    /// A replaying context never sends it anywhere, so a placeholder stands
    /// in when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a live tracker has no token.
    pub fn token(&self, config: &Config) -> Result<Token, ConfigError> {
        match config.require_token() {
            Ok(token) => Ok(token.clone()),
            Err(_) if self.replaying => Ok(Token::new("replay")),
            Err(e) => Err(e),
        }
    }

    /// Builds an engine over this context's adapters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no token is available.
    pub fn reconciler(&self, config: &Config) -> Result<Reconciler, ConfigError> {
        Ok(Reconciler::new(
            Arc::clone(&self.tracker),
            Arc::clone(&self.store),
            self.token(config)?,
            config.reconciler(),
        ))
    }
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            let guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.save() {
                Ok(path) => {
                    info!(
                        cassette = %path.display(),
                        interactions = guard.len(),
                        "cassette written"
                    );
                }
                Err(e) => warn!(error = %e, "failed to write cassette"),
            }
        }
    }
}
