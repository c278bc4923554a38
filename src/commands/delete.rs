//! `issue-sync delete` command.

use chrono::Utc;

use crate::context::ServiceContext;
use crate::model::ObjectKey;

/// Execute the `delete` command.
///
/// Records the deletion request. An object still carrying finalizers stays
/// until a reconcile pass releases them.
///
/// # Errors
///
/// Returns an error string if the object does not exist or cannot be written.
pub fn run(ctx: &ServiceContext, key: &ObjectKey) -> Result<(), String> {
    ctx.store.request_deletion(key, Utc::now()).map_err(|e| e.to_string())?;
    match ctx.store.get(key).map_err(|e| e.to_string())? {
        Some(issue) => println!(
            "{key}: deletion requested, waiting on {} finalizer(s)",
            issue.metadata.finalizers.len()
        ),
        None => println!("{key}: removed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryIssueStore, InMemoryIssueTracker};
    use crate::model::IssueSpec;
    use crate::ports::IssueStore;
    use crate::reconcile::FINALIZER;
    use std::sync::Arc;

    fn ctx() -> (Arc<InMemoryIssueStore>, ServiceContext) {
        let store = Arc::new(InMemoryIssueStore::new());
        let ctx =
            ServiceContext::with_adapters(Arc::new(InMemoryIssueTracker::new()), store.clone());
        (store, ctx)
    }

    fn spec() -> IssueSpec {
        IssueSpec {
            repo: "o/r".into(),
            title: "T".into(),
            description: "D".into(),
        }
    }

    #[test]
    fn unfinalized_object_is_removed_at_once() {
        let (store, ctx) = ctx();
        let key = ObjectKey::new("default", "a");
        store.apply(&key, spec()).unwrap();

        run(&ctx, &key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn finalized_object_waits_for_reconcile() {
        let (store, ctx) = ctx();
        let key = ObjectKey::new("default", "a");
        let mut issue = store.apply(&key, spec()).unwrap();
        issue.metadata.finalizers.push(FINALIZER.into());
        store.update(&issue).unwrap();

        run(&ctx, &key).unwrap();
        assert!(store.get(&key).unwrap().unwrap().is_being_deleted());
    }

    #[test]
    fn missing_object_is_an_error() {
        let (_store, ctx) = ctx();
        assert!(run(&ctx, &ObjectKey::new("default", "nope")).is_err());
    }
}
