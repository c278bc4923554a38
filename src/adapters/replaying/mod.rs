//! Replaying adapters that serve recorded tracker calls.

pub mod issues;

use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::CassetteError;

pub use issues::ReplayingIssueTracker;

/// Decoded recorded outcome: the recorded `Ok` value or the recorded `Err`.
pub(crate) type Replayed<T, E> = Result<Result<T, E>, CassetteError>;

/// Pull the next output for `port::method` and decode the Ok/Err convention
/// written by `recording::record_result`.
pub(crate) fn replay_result<T, E>(
    replayer: &Mutex<CassetteReplayer>,
    port: &str,
    method: &str,
) -> Replayed<T, E>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
{
    let output = {
        let mut guard = replayer.lock().unwrap_or_else(PoisonError::into_inner);
        guard.next_interaction(port, method)?.output.clone()
    };
    let malformed = |reason: String| CassetteError::Malformed {
        port: port.to_string(),
        method: method.to_string(),
        reason,
    };

    if let Some(ok) = output.get("Ok") {
        return serde_json::from_value(ok.clone()).map(Ok).map_err(|e| malformed(e.to_string()));
    }
    if let Some(err) = output.get("Err") {
        return serde_json::from_value(err.clone()).map(Err).map_err(|e| malformed(e.to_string()));
    }
    Err(malformed("expected an Ok or Err key".to_string()))
}
