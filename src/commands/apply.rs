//! `issue-sync apply` command.

use std::path::Path;

use serde::Deserialize;

use crate::context::ServiceContext;
use crate::model::{IssueSpec, ObjectKey, RepoRef, DEFAULT_NAMESPACE};

/// A desired issue as written by its owner.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    namespace: Option<String>,
    name: String,
    repo: String,
    title: String,
    #[serde(default)]
    description: String,
}

/// Reads a manifest file into the key and spec it declares.
///
/// # Errors
///
/// Returns an error string if the file cannot be read or parsed, or the
/// repository is not in `owner/repo` form.
pub fn load_manifest(path: &Path) -> Result<(ObjectKey, IssueSpec), String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read manifest {}: {e}", path.display()))?;
    let manifest: Manifest = serde_yaml::from_str(&content)
        .map_err(|e| format!("Failed to parse manifest {}: {e}", path.display()))?;

    let key: ObjectKey = format!(
        "{}/{}",
        manifest.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE),
        manifest.name
    )
    .parse()?;
    RepoRef::parse(&manifest.repo).map_err(|e| e.to_string())?;
    if manifest.title.trim().is_empty() {
        return Err(format!("{key}: title must not be empty"));
    }
    let spec = IssueSpec {
        repo: manifest.repo,
        title: manifest.title,
        description: manifest.description,
    };
    Ok((key, spec))
}

/// Execute the `apply` command.
///
/// # Errors
///
/// Returns an error string if the manifest is invalid or cannot be stored.
pub fn run(ctx: &ServiceContext, file: &Path) -> Result<(), String> {
    let (key, spec) = load_manifest(file)?;
    let stored = ctx.store.apply(&key, spec).map_err(|e| e.to_string())?;
    println!("{key} applied (version {})", stored.metadata.resource_version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryIssueStore, InMemoryIssueTracker};
    use crate::ports::IssueStore;
    use std::sync::Arc;

    fn write(dir: &Path, name: &str, yaml: &str) -> std::path::PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn manifest_without_namespace_lands_in_default() {
        let dir = std::env::temp_dir().join("issue_sync_apply_default_ns");
        let path = write(&dir, "a.yaml", "name: a\nrepo: octo/widgets\ntitle: T\ndescription: D\n");

        let (key, spec) = load_manifest(&path).unwrap();
        assert_eq!(key, ObjectKey::new("default", "a"));
        assert_eq!(spec.description, "D");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_repo_is_rejected() {
        let dir = std::env::temp_dir().join("issue_sync_apply_bad_repo");
        let path = write(&dir, "a.yaml", "name: a\nrepo: widgets\ntitle: T\n");

        let err = load_manifest(&path).unwrap_err();
        assert!(err.contains("invalid repository"), "{err}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn manifest_cannot_name_a_parent_directory() {
        let dir = std::env::temp_dir().join("issue_sync_apply_parent_ns");
        let parent = write(&dir, "a.yaml", "namespace: ..\nname: a\nrepo: o/r\ntitle: T\n");
        let hidden = write(&dir, "b.yaml", "name: .b\nrepo: o/r\ntitle: T\n");
        let nested = write(&dir, "c.yaml", "name: x/../../c\nrepo: o/r\ntitle: T\n");

        for path in [parent, hidden, nested] {
            let err = load_manifest(&path).unwrap_err();
            assert!(err.contains("invalid key"), "{err}");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn apply_twice_replaces_spec() {
        let dir = std::env::temp_dir().join("issue_sync_apply_twice");
        let store = Arc::new(InMemoryIssueStore::new());
        let ctx =
            ServiceContext::with_adapters(Arc::new(InMemoryIssueTracker::new()), store.clone());

        let manifest = "namespace: team\nname: a\nrepo: o/r\ntitle: T\n";
        let first = write(&dir, "a.yaml", &format!("{manifest}description: one\n"));
        run(&ctx, &first).unwrap();
        let second = write(&dir, "b.yaml", &format!("{manifest}description: two\n"));
        run(&ctx, &second).unwrap();

        let stored = store.get(&ObjectKey::new("team", "a")).unwrap().unwrap();
        assert_eq!(stored.spec.description, "two");
        assert_eq!(stored.metadata.resource_version, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
