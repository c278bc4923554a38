//! YAML-directory adapter for the `IssueStore` port.
//!
//! Directory layout:
//!
//! ```text
//! <root>/
//!   └── <namespace>/
//!         └── <name>.yaml
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{DesiredIssue, IssueSpec, ObjectKey};
use crate::ports::store::{
    admit_apply, admit_deletion, admit_status_patch, admit_update, Admitted, IssueStore,
    StatusPatch,
};

/// Stores each desired issue as one YAML file.
///
/// Writes within one process are serialized so the version check and the
/// write happen atomically with respect to each other.
pub struct YamlIssueStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlIssueStore {
    /// Creates a store rooted at the given directory. Nothing is created until the first write.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, key: &ObjectKey) -> Result<PathBuf, StoreError> {
        key.validate().map_err(|reason| StoreError::InvalidKey {
            key: key.clone(),
            reason,
        })?;
        Ok(self.root.join(&key.namespace).join(format!("{}.yaml", key.name)))
    }

    fn read(&self, key: &ObjectKey) -> Result<Option<DesiredIssue>, StoreError> {
        let path = self.path(key)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    reason: format!("failed to read {}: {e}", path.display()),
                })
            }
        };
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                key: key.clone(),
                reason: e.to_string(),
            })
    }

    fn read_existing(&self, key: &ObjectKey) -> Result<DesiredIssue, StoreError> {
        self.read(key)?.ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    fn write(&self, issue: &DesiredIssue) -> Result<(), StoreError> {
        let key = issue.key();
        let path = self.path(&key)?;
        let yaml = serde_yaml::to_string(issue)
            .map_err(|e| StoreError::Serialization {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }
        let staging = path.with_extension("yaml.tmp");
        std::fs::write(&staging, yaml)
            .and_then(|()| std::fs::rename(&staging, &path))
            .map_err(|e| StoreError::Io {
                reason: format!("failed to write {}: {e}", path.display()),
            })
    }

    fn remove(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let path = self.path(key)?;
        std::fs::remove_file(&path).map_err(|e| StoreError::Io {
            reason: format!("failed to remove {}: {e}", path.display()),
        })
    }

    fn commit(&self, admitted: Admitted) -> Result<DesiredIssue, StoreError> {
        match admitted {
            Admitted::Store(issue) => {
                self.write(&issue)?;
                Ok(issue)
            }
            Admitted::Remove(issue) => {
                self.remove(&issue.key())?;
                Ok(issue)
            }
        }
    }
}

fn list_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| StoreError::Io {
        reason: format!("failed to list {}: {e}", dir.display()),
    })?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::Io {
            reason: e.to_string(),
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        out.push((name, entry.path()));
    }
    Ok(out)
}

impl IssueStore for YamlIssueStore {
    fn list(&self) -> Result<Vec<ObjectKey>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for (namespace, path) in list_dir(&self.root)? {
            if !path.is_dir() {
                continue;
            }
            keys.extend(
                list_dir(&path)?
                    .into_iter()
                    .filter_map(|(file, _)| {
                        file.strip_suffix(".yaml")
                            .map(|name| ObjectKey::new(namespace.clone(), name))
                    })
                    .filter(|key| key.validate().is_ok()),
            );
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &ObjectKey) -> Result<Option<DesiredIssue>, StoreError> {
        self.read(key)
    }

    fn apply(&self, key: &ObjectKey, spec: IssueSpec) -> Result<DesiredIssue, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read(key)?;
        let next = admit_apply(current.as_ref(), key, spec);
        self.write(&next)?;
        Ok(next)
    }

    fn update(&self, issue: &DesiredIssue) -> Result<DesiredIssue, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read_existing(&issue.key())?;
        self.commit(admit_update(&current, issue)?)
    }

    fn patch_status(
        &self,
        key: &ObjectKey,
        patch: &StatusPatch,
    ) -> Result<DesiredIssue, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read_existing(key)?;
        let next = admit_status_patch(&current, patch)?;
        self.write(&next)?;
        Ok(next)
    }

    fn request_deletion(&self, key: &ObjectKey, at: DateTime<Utc>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read_existing(key)?;
        self.commit(admit_deletion(&current, at)).map(|_| ())
    }
}
