//! Cassette data structures for recording and replaying tracker calls.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CassetteError;

/// A single recorded call to a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number (assigned automatically by the recorder).
    pub seq: u64,
    /// Port name (e.g. "issues").
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Arguments sent to the port, minus credentials.
    pub input: serde_json::Value,
    /// `{"Ok": value}` or `{"Err": error}`.
    pub output: serde_json::Value,
}

/// A cassette containing a sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// API root the interactions were recorded against.
    pub target: String,
    /// Ordered list of interactions.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Reads a cassette from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CassetteError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CassetteError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        serde_yaml::from_str(&content)
            .map_err(|e| CassetteError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Writes the cassette as YAML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), CassetteError> {
        let io_err = |e: std::io::Error| CassetteError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| CassetteError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, yaml).map_err(io_err)
    }
}
