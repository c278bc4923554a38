//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::ObjectKey;

/// Top-level CLI parser for `issue-sync`.
#[derive(Debug, Parser)]
#[command(name = "issue-sync", version, about = "Keep declared issues in sync with GitHub")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or replace a desired issue from a YAML manifest.
    Apply {
        /// Manifest with `name`, `repo`, `title`, `description` and an optional `namespace`.
        file: PathBuf,
    },
    /// Request deletion of a desired issue.
    Delete {
        /// `namespace/name`, or `name` in the default namespace.
        key: ObjectKey,
    },
    /// Run a single reconcile pass for one desired issue.
    Reconcile {
        /// `namespace/name`, or `name` in the default namespace.
        key: ObjectKey,
    },
    /// Reconcile every desired issue once.
    Sync,
    /// Reconcile continuously until interrupted.
    Run,
    /// Show desired issues and their mirrored status.
    Status,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::model::ObjectKey;
    use clap::Parser;

    #[test]
    fn parses_apply_subcommand() {
        let cli = Cli::parse_from(["issue-sync", "apply", "bug.yaml"]);
        assert!(matches!(cli.command, Command::Apply { file } if file.ends_with("bug.yaml")));
    }

    #[test]
    fn parses_namespaced_and_bare_keys() {
        let cli = Cli::parse_from(["issue-sync", "reconcile", "team/bug"]);
        assert!(matches!(
            cli.command,
            Command::Reconcile { key } if key == ObjectKey::new("team", "bug")
        ));

        let cli = Cli::parse_from(["issue-sync", "delete", "bug"]);
        assert!(matches!(
            cli.command,
            Command::Delete { key } if key == ObjectKey::new("default", "bug")
        ));
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(Cli::try_parse_from(["issue-sync", "delete", "a/b/c"]).is_err());
    }

    #[test]
    fn parses_argumentless_subcommands() {
        assert!(matches!(Cli::parse_from(["issue-sync", "sync"]).command, Command::Sync));
        assert!(matches!(Cli::parse_from(["issue-sync", "run"]).command, Command::Run));
        assert!(matches!(Cli::parse_from(["issue-sync", "status"]).command, Command::Status));
    }
}
