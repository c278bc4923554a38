//! `issue-sync status` command.

use crate::context::ServiceContext;
use crate::reconcile::finalizer::has_marker;

/// Execute the `status` command.
///
/// Displays a table of all desired issues showing key, repository, title,
/// finalizer and deletion flags, and the mirrored remote status.
///
/// # Errors
///
/// Returns an error string if listing or loading fails.
pub fn run(ctx: &ServiceContext) -> Result<(), String> {
    let keys = ctx.store.list().map_err(|e| e.to_string())?;
    if keys.is_empty() {
        println!("No desired issues found in store.");
        return Ok(());
    }

    let mut rows: Vec<[String; 6]> = Vec::new();
    for key in &keys {
        let Some(issue) = ctx.store.get(key).map_err(|e| e.to_string())? else {
            continue;
        };
        let state = issue.status.state.map_or_else(|| "-".to_string(), |s| s.to_string());
        let updated = issue
            .status
            .last_update_timestamp
            .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d %H:%M").to_string());
        rows.push([
            key.to_string(),
            issue.spec.repo.clone(),
            issue.spec.title.clone(),
            flags(has_marker(&issue), issue.is_being_deleted()),
            state,
            updated,
        ]);
    }

    let headers = ["KEY", "REPO", "TITLE", "FLAGS", "STATE", "UPDATED"];
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| rows.iter().map(|r| r[i].len()).max().unwrap_or(0).max(headers[i].len()))
        .collect();

    println!("{}", line(&headers.map(String::from), &widths));
    println!("{}", line(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>(), &widths));
    for row in &rows {
        println!("{}", line(row, &widths));
    }

    println!("\n{} desired issue(s) total.", rows.len());
    Ok(())
}

fn flags(finalized: bool, deleting: bool) -> String {
    match (finalized, deleting) {
        (true, true) => "F,D".to_string(),
        (true, false) => "F".to_string(),
        (false, true) => "D".to_string(),
        (false, false) => "-".to_string(),
    }
}

fn line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryIssueStore, InMemoryIssueTracker};
    use crate::model::{IssueSpec, ObjectKey};
    use crate::ports::IssueStore;
    use std::sync::Arc;

    #[test]
    fn status_command_empty_store() {
        let ctx = ServiceContext::with_adapters(
            Arc::new(InMemoryIssueTracker::new()),
            Arc::new(InMemoryIssueStore::new()),
        );
        assert!(run(&ctx).is_ok());
    }

    #[test]
    fn status_command_with_issues() {
        let store = Arc::new(InMemoryIssueStore::new());
        let spec = IssueSpec {
            repo: "o/r".into(),
            title: "T".into(),
            description: "D".into(),
        };
        store.apply(&ObjectKey::new("default", "a"), spec).unwrap();
        let ctx = ServiceContext::with_adapters(Arc::new(InMemoryIssueTracker::new()), store);
        assert!(run(&ctx).is_ok());
    }

    #[test]
    fn flags_and_padding() {
        assert_eq!(flags(true, true), "F,D");
        assert_eq!(flags(false, false), "-");
        assert_eq!(line(&["ab".into(), "c".into()], &[4, 3]), "ab    c");
    }
}
