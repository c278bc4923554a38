//! Runtime configuration read from the environment.
//!
//! Variables may also come from a `.env` file, loaded by the binary before
//! [`Config::from_env`] runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::live::github::GITHUB_API_URL;
use crate::error::ConfigError;
use crate::model::Token;
use crate::reconcile::ReconcilerConfig;

const TOKEN_VAR: &str = "GITHUB_TOKEN";
const API_URL_VAR: &str = "ISSUE_SYNC_API_URL";
const STORE_VAR: &str = "ISSUE_SYNC_STORE";
const CALL_TIMEOUT_VAR: &str = "ISSUE_SYNC_CALL_TIMEOUT_SECS";
const RETRY_VAR: &str = "ISSUE_SYNC_RETRY_SECS";
const RESYNC_VAR: &str = "ISSUE_SYNC_RESYNC_SECS";
const RECORD_VAR: &str = "ISSUE_SYNC_RECORD";
const REPLAY_VAR: &str = "ISSUE_SYNC_REPLAY";

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// GitHub credential, if one is set.
    pub token: Option<Token>,
    /// Base URL of the GitHub REST API.
    pub api_url: String,
    /// Directory holding desired issues.
    pub store_dir: PathBuf,
    /// Bound on each remote call.
    pub call_timeout: Duration,
    /// Delay before a failed pass is retried.
    pub retry_after: Duration,
    /// Interval between full re-lists in `run`.
    pub resync: Duration,
    /// Cassette to record tracker calls into.
    pub record: Option<PathBuf>,
    /// Cassette to serve tracker calls from.
    pub replay: Option<PathBuf>,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric variable does not parse
    /// or both recording and replaying are requested.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let secs = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            var(name).map_or(Ok(Duration::from_secs(default)), |raw| {
                match raw.trim().parse::<u64>() {
                    Ok(0) => Err(ConfigError::Invalid {
                        name,
                        reason: "must be greater than zero".into(),
                    }),
                    Ok(n) => Ok(Duration::from_secs(n)),
                    Err(e) => Err(ConfigError::Invalid {
                        name,
                        reason: format!("'{raw}': {e}"),
                    }),
                }
            })
        };

        let config = Self {
            token: var(TOKEN_VAR).map(Token::new),
            api_url: var(API_URL_VAR).unwrap_or_else(|| GITHUB_API_URL.to_string()),
            store_dir: var(STORE_VAR).map_or_else(|| PathBuf::from(".issue-sync"), PathBuf::from),
            call_timeout: secs(CALL_TIMEOUT_VAR, 30)?,
            retry_after: secs(RETRY_VAR, 5)?,
            resync: secs(RESYNC_VAR, 60)?,
            record: var(RECORD_VAR).map(PathBuf::from),
            replay: var(REPLAY_VAR).map(PathBuf::from),
        };
        if config.record.is_some() && config.replay.is_some() {
            return Err(ConfigError::Invalid {
                name: RECORD_VAR,
                reason: format!("cannot be combined with {REPLAY_VAR}"),
            });
        }
        Ok(config)
    }

    /// The GitHub token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `GITHUB_TOKEN` is unset.
    pub fn require_token(&self) -> Result<&Token, ConfigError> {
        self.token.as_ref().ok_or(ConfigError::Missing { name: TOKEN_VAR })
    }

    /// Engine tuning derived from these settings.
    #[must_use]
    pub const fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            call_timeout: self.call_timeout,
            retry_after: self.retry_after,
        }
    }
}
