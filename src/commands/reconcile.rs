//! `issue-sync reconcile` command.

use crate::config::Config;
use crate::context::ServiceContext;
use crate::model::ObjectKey;
use crate::reconcile::Outcome;

use super::describe;

/// Execute the `reconcile` command: one pass for `key`.
///
/// # Errors
///
/// Returns an error string naming the failure if the pass does not complete.
pub async fn run(ctx: &ServiceContext, config: &Config, key: &ObjectKey) -> Result<(), String> {
    let reconciler = ctx.reconciler(config).map_err(|e| e.to_string())?;
    match reconciler.try_reconcile(key).await {
        Ok(report) => {
            println!("{}", describe(key, &Outcome::Done(report)));
            Ok(())
        }
        Err(e) if e.is_retryable() => Err(format!("{key}: {e} (safe to retry)")),
        Err(e) => Err(format!("{key}: {e}")),
    }
}
