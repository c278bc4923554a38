//! `issue-sync sync` command.

use std::sync::Arc;

use crate::config::Config;
use crate::context::ServiceContext;
use crate::controller::Controller;
use crate::reconcile::Outcome;

use super::describe;

/// Execute the `sync` command: one pass for every stored key.
///
/// # Errors
///
/// Returns an error string if the store cannot be listed or any pass did not
/// complete.
pub async fn run(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    let reconciler = ctx.reconciler(config).map_err(|e| e.to_string())?;
    let controller = Controller::new(Arc::new(reconciler), Arc::clone(&ctx.store), config.resync);
    let outcomes = controller.run_once().await.map_err(|e| e.to_string())?;
    if outcomes.is_empty() {
        println!("No desired issues found in store.");
        return Ok(());
    }

    for (key, outcome) in &outcomes {
        println!("{}", describe(key, outcome));
    }
    let failed = outcomes.iter().filter(|(_, o)| !matches!(o, Outcome::Done(_))).count();
    if failed > 0 {
        return Err(format!("{failed} of {} object(s) did not converge", outcomes.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryIssueStore, InMemoryIssueTracker};
    use crate::model::{IssueSpec, ObjectKey, RepoRef, Token};
    use crate::ports::IssueStore;

    #[tokio::test]
    async fn sync_converges_every_key_and_flags_failures() {
        let tracker = Arc::new(InMemoryIssueTracker::new());
        let store = Arc::new(InMemoryIssueStore::new());
        let ctx = ServiceContext::with_adapters(tracker.clone(), store.clone());
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.token = Some(Token::new("t"));

        for (name, repo) in [("a", "octo/widgets"), ("b", "octo/widgets"), ("c", "broken")] {
            let spec = IssueSpec {
                repo: repo.into(),
                title: name.into(),
                description: "D".into(),
            };
            store.apply(&ObjectKey::new("default", name), spec).unwrap();
        }

        let err = run(&ctx, &config).await.unwrap_err();
        assert_eq!(err, "1 of 3 object(s) did not converge");
        assert_eq!(tracker.issues(&RepoRef::parse("octo/widgets").unwrap()).len(), 2);
    }
}
