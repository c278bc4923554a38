//! Desired and remote issue data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Namespace used when a key is given without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identifies a desired issue in the owning store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace the object lives in.
    pub namespace: String,
    /// Object name, unique within its namespace.
    pub name: String,
}

impl ObjectKey {
    /// Builds a key from its parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Checks that both parts are usable as a single path segment.
    ///
    /// # Errors
    ///
    /// Returns the reason when a part is empty, starts with `.`, or contains a
    /// path separator or control character.
    pub fn validate(&self) -> Result<(), String> {
        for part in [&self.namespace, &self.name] {
            check_segment(part).map_err(|reason| format!("invalid key '{self}': {reason}"))?;
        }
        Ok(())
    }
}

fn check_segment(part: &str) -> Result<(), &'static str> {
    if part.is_empty() {
        return Err("empty namespace or name");
    }
    if part.starts_with('.') {
        return Err("parts must not start with '.'");
    }
    if part.contains(['/', '\\']) || part.chars().any(char::is_control) {
        return Err("parts must not contain path separators or control characters");
    }
    Ok(())
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    /// Parses `namespace/name` or a bare `name` (placed in the default namespace).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (namespace, name) = match raw.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => (DEFAULT_NAMESPACE, raw),
        };
        let key = Self::new(namespace, name);
        key.validate()?;
        Ok(key)
    }
}

/// Store-managed object metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
    /// Version assigned by the store; bumped on every write.
    #[serde(default)]
    pub resource_version: u64,
    /// Markers that block physical removal while present.
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Set by the owner when the object should go away. Never cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_requested: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Returns the key addressing this object.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// What the owner wants the remote issue to look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSpec {
    /// Repository in `owner/repo` form.
    pub repo: String,
    /// Title used to find the remote counterpart.
    pub title: String,
    /// Description kept in sync with the remote issue body.
    #[serde(default)]
    pub description: String,
}

/// Remote-side fields mirrored onto the desired issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    /// Last observed remote state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    /// Last observed remote update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_timestamp: Option<DateTime<Utc>>,
}

/// A declared issue as held by the owning store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredIssue {
    /// Identity, version, finalizers and deletion intent.
    pub metadata: ObjectMeta,
    /// Desired remote content.
    pub spec: IssueSpec,
    /// Mirror of the remote issue.
    #[serde(default)]
    pub status: IssueStatus,
}

impl DesiredIssue {
    /// Creates a fresh object with no finalizers and an empty status.
    #[must_use]
    pub fn new(key: &ObjectKey, spec: IssueSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                resource_version: 0,
                finalizers: Vec::new(),
                deletion_requested: None,
            },
            spec,
            status: IssueStatus::default(),
        }
    }

    /// Returns the key addressing this object.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    /// Whether the owner has asked for this object to be removed.
    #[must_use]
    pub const fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_requested.is_some()
    }
}

/// Open/closed state of a remote issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// The issue is open.
    Open,
    /// The issue is closed.
    Closed,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// An issue as reported by the remote tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    /// Tracker-issued identifier.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Issue body; the tracker reports `null` for an empty body.
    #[serde(default)]
    pub body: Option<String>,
    /// Open or closed.
    pub state: IssueState,
    /// Last modification time on the tracker.
    pub updated_at: DateTime<Utc>,
}

impl RemoteIssue {
    /// The body as a description, treating a missing body as empty.
    #[must_use]
    pub fn description(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// A repository reference parsed from `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organisation owning the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Parses an `owner/repo` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidRepo`] when the identifier does not
    /// have exactly two non-empty segments.
    pub fn parse(raw: &str) -> Result<Self, ReconcileError> {
        let invalid = || ReconcileError::InvalidRepo {
            repo: raw.to_string(),
            reason: "expected owner/repo".to_string(),
        };
        let (owner, name) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        if owner.chars().chain(name.chars()).any(char::is_whitespace) {
            return Err(ReconcileError::InvalidRepo {
                repo: raw.to_string(),
                reason: "whitespace is not allowed".to_string(),
            });
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Bearer credential passed to every remote call.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wraps a raw token value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token, for building the authorization header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_and_bare_keys() {
        let key: ObjectKey = "team/bug-42".parse().unwrap();
        assert_eq!(key, ObjectKey::new("team", "bug-42"));

        let key: ObjectKey = "bug-42".parse().unwrap();
        assert_eq!(key.namespace, DEFAULT_NAMESPACE);
        assert_eq!(key.to_string(), "default/bug-42");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("/name".parse::<ObjectKey>().is_err());
        assert!("ns/".parse::<ObjectKey>().is_err());
        assert!("a/b/c".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn rejects_keys_that_leave_their_directory() {
        for raw in ["../x", "./x", "..", "ns/..", "ns/.hidden", "ns/a\\b", "..\\x"] {
            let err = raw.parse::<ObjectKey>().unwrap_err();
            assert!(err.starts_with("invalid key"), "{raw}: {err}");
        }
        assert!(ObjectKey::new("..", "x").validate().is_err());
        assert!(ObjectKey::new("team", "bug.v2").validate().is_ok());
    }

    #[test]
    fn repo_ref_requires_owner_and_name() {
        let repo = RepoRef::parse("octo/widgets").unwrap();
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.to_string(), "octo/widgets");

        for bad in ["octo", "octo/", "/widgets", "octo/widgets/extra", "oc to/widgets"] {
            let err = RepoRef::parse(bad).unwrap_err();
            assert!(!err.is_retryable(), "{bad} should be fatal");
        }
    }

    #[test]
    fn null_body_reads_as_empty_description() {
        let issue: RemoteIssue = serde_json::from_value(serde_json::json!({
            "number": 7,
            "title": "T",
            "body": null,
            "state": "open",
            "updated_at": "2021-05-31T07:49:28Z"
        }))
        .unwrap();
        assert_eq!(issue.description(), "");
        assert_eq!(issue.state, IssueState::Open);
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::new("ghp_secret");
        assert_eq!(format!("{token:?}"), "Token(***)");
        assert_eq!(token.expose(), "ghp_secret");
    }
}
