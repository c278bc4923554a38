//! In-memory adapter for the `IssueStore` port.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{DesiredIssue, IssueSpec, ObjectKey};
use crate::ports::store::{
    admit_apply, admit_deletion, admit_status_patch, admit_update, Admitted, IssueStore,
    StatusPatch,
};

/// Desired-issue store held in memory, with conflict injection for tests.
#[derive(Default)]
pub struct InMemoryIssueStore {
    objects: Mutex<BTreeMap<ObjectKey, DesiredIssue>>,
    forced_conflicts: Mutex<u32>,
}

impl InMemoryIssueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ObjectKey, DesiredIssue>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites an object verbatim, version included.
    pub fn insert(&self, issue: DesiredIssue) {
        self.lock().insert(issue.key(), issue);
    }

    /// Makes the next `count` version-checked writes fail with a conflict.
    pub fn force_conflicts(&self, count: u32) {
        *self.forced_conflicts.lock().unwrap_or_else(PoisonError::into_inner) = count;
    }

    fn take_forced_conflict(&self, current: &DesiredIssue) -> Result<(), StoreError> {
        let mut remaining = self.forced_conflicts.lock().unwrap_or_else(PoisonError::into_inner);
        if *remaining == 0 {
            return Ok(());
        }
        *remaining -= 1;
        Err(StoreError::Conflict {
            key: current.key(),
            expected: current.metadata.resource_version,
            actual: current.metadata.resource_version + 1,
        })
    }
}

fn commit(objects: &mut BTreeMap<ObjectKey, DesiredIssue>, admitted: Admitted) -> DesiredIssue {
    match admitted {
        Admitted::Store(issue) => {
            objects.insert(issue.key(), issue.clone());
            issue
        }
        Admitted::Remove(issue) => {
            objects.remove(&issue.key());
            issue
        }
    }
}

impl IssueStore for InMemoryIssueStore {
    fn list(&self) -> Result<Vec<ObjectKey>, StoreError> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn get(&self, key: &ObjectKey) -> Result<Option<DesiredIssue>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn apply(&self, key: &ObjectKey, spec: IssueSpec) -> Result<DesiredIssue, StoreError> {
        let mut objects = self.lock();
        let next = admit_apply(objects.get(key), key, spec);
        objects.insert(key.clone(), next.clone());
        Ok(next)
    }

    fn update(&self, issue: &DesiredIssue) -> Result<DesiredIssue, StoreError> {
        let mut objects = self.lock();
        let key = issue.key();
        let current = objects.get(&key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        self.take_forced_conflict(current)?;
        let admitted = admit_update(current, issue)?;
        Ok(commit(&mut objects, admitted))
    }

    fn patch_status(
        &self,
        key: &ObjectKey,
        patch: &StatusPatch,
    ) -> Result<DesiredIssue, StoreError> {
        let mut objects = self.lock();
        let current = objects.get(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        self.take_forced_conflict(current)?;
        let next = admit_status_patch(current, patch)?;
        objects.insert(key.clone(), next.clone());
        Ok(next)
    }

    fn request_deletion(&self, key: &ObjectKey, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut objects = self.lock();
        let current = objects.get(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        let admitted = admit_deletion(current, at);
        commit(&mut objects, admitted);
        Ok(())
    }
}
