//! Command dispatch and handlers.

pub mod apply;
pub mod delete;
pub mod reconcile;
pub mod run;
pub mod status;
pub mod sync;

use crate::cli::Command;
use crate::config::Config;
use crate::context::ServiceContext;
use crate::model::ObjectKey;
use crate::reconcile::Outcome;

/// Dispatch a parsed command to its handler.
///
/// The tracker is live, recording or replaying depending on
/// `ISSUE_SYNC_RECORD` and `ISSUE_SYNC_REPLAY`. A recording is written once
/// the command finishes, even when it fails.
///
/// # Errors
///
/// Returns an error string if the context cannot be built or the selected
/// command handler fails.
pub async fn dispatch(command: &Command, config: &Config) -> Result<(), String> {
    let ctx = ServiceContext::from_config(config)?;
    dispatch_with_context(command, config, &ctx).await
}

/// Dispatch a command with the given service context.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub async fn dispatch_with_context(
    command: &Command,
    config: &Config,
    ctx: &ServiceContext,
) -> Result<(), String> {
    match command {
        Command::Apply { file } => apply::run(ctx, file),
        Command::Delete { key } => delete::run(ctx, key),
        Command::Reconcile { key } => reconcile::run(ctx, config, key).await,
        Command::Sync => sync::run(ctx, config).await,
        Command::Run => run::run(ctx, config).await,
        Command::Status => status::run(ctx),
    }
}

/// One line describing how a pass ended.
fn describe(key: &ObjectKey, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Done(report) if report.is_noop() => format!("{key}: in sync"),
        Outcome::Done(report) => {
            let changes: Vec<String> = report.changes.iter().map(ToString::to_string).collect();
            format!("{key}: {}", changes.join(", "))
        }
        Outcome::RetryAfter(delay) => format!("{key}: failed, retry in {}s", delay.as_secs()),
        Outcome::Fatal(e) => format!("{key}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Change, Report};
    use std::time::Duration;

    #[test]
    fn describe_covers_each_outcome() {
        let key = ObjectKey::new("default", "a");
        let noop = Outcome::Done(Report {
            key: key.clone(),
            changes: vec![],
        });
        assert_eq!(describe(&key, &noop), "default/a: in sync");

        let done = Outcome::Done(Report {
            key: key.clone(),
            changes: vec![Change::FinalizerAdded, Change::Created { number: 4 }],
        });
        assert_eq!(describe(&key, &done), "default/a: finalizer added, created issue #4");

        let retry = Outcome::RetryAfter(Duration::from_secs(5));
        assert_eq!(describe(&key, &retry), "default/a: failed, retry in 5s");
    }
}
