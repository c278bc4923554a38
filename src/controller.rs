//! Drives the reconciler over every stored object.
//!
//! The controller is the event source for the engine: it lists keys on a
//! resync interval, keeps at most one pass per key in flight, re-queues
//! retryable failures after the delay the engine asked for, and parks keys
//! that failed fatally until their object changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::model::ObjectKey;
use crate::ports::IssueStore;
use crate::reconcile::{cancelled, Outcome, Reconciler};

/// Per-key scheduling state.
#[derive(Debug, Default)]
struct Schedule {
    in_flight: HashMap<Id, ObjectKey>,
    not_before: HashMap<ObjectKey, Instant>,
    parked: HashMap<ObjectKey, u64>,
}

impl Schedule {
    fn is_running(&self, key: &ObjectKey) -> bool {
        self.in_flight.values().any(|k| k == key)
    }

    /// Whether `key` may start a pass now. `version` is the object's current
    /// resource version, if it still exists.
    fn admit(&mut self, key: &ObjectKey, now: Instant, version: Option<u64>) -> bool {
        if self.is_running(key) {
            return false;
        }
        if let Some(deadline) = self.not_before.get(key) {
            if *deadline > now {
                return false;
            }
            self.not_before.remove(key);
        }
        if let Some(parked_at) = self.parked.get(key) {
            if version == Some(*parked_at) {
                return false;
            }
            self.parked.remove(key);
        }
        true
    }

    fn due_retries(&self, now: Instant) -> Vec<ObjectKey> {
        let mut due: Vec<ObjectKey> =
            self.not_before.iter().filter(|(_, at)| **at <= now).map(|(k, _)| k.clone()).collect();
        due.sort();
        due
    }

    fn earliest_retry(&self) -> Option<Instant> {
        self.not_before.values().min().copied()
    }

    fn record(&mut self, key: ObjectKey, outcome: &Outcome, now: Instant, version: Option<u64>) {
        match outcome {
            Outcome::Done(_) => {
                self.not_before.remove(&key);
                self.parked.remove(&key);
            }
            Outcome::RetryAfter(delay) => {
                self.not_before.insert(key, now + *delay);
            }
            Outcome::Fatal(_) => match version {
                Some(version) => {
                    self.parked.insert(key, version);
                }
                None => {
                    self.parked.remove(&key);
                }
            },
        }
    }
}

/// Runs reconcile passes for every key in the store.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    store: Arc<dyn IssueStore>,
    resync: Duration,
}

impl Controller {
    /// Creates a controller that re-lists the store every `resync`.
    pub fn new(reconciler: Arc<Reconciler>, store: Arc<dyn IssueStore>, resync: Duration) -> Self {
        Self {
            reconciler,
            store,
            resync,
        }
    }

    /// Reconciles every stored key once, concurrently, and returns each
    /// outcome ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn run_once(&self) -> Result<Vec<(ObjectKey, Outcome)>, StoreError> {
        let keys = self.store.list()?;
        let mut tasks = JoinSet::new();
        for key in keys {
            let reconciler = Arc::clone(&self.reconciler);
            tasks.spawn(async move {
                let outcome = reconciler.reconcile(&key).await;
                (key, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => outcomes.push(result),
                Err(e) => error!(error = %e, "reconcile task failed"),
            }
        }
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(outcomes)
    }

    /// Runs until `shutdown` turns true.
    ///
    /// On shutdown every in-flight pass is cancelled and awaited before
    /// returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(resync_secs = self.resync.as_secs(), "controller started");
        let mut schedule = Schedule::default();
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut next_resync = Instant::now();

        loop {
            let wake = schedule.earliest_retry().map_or(next_resync, |at| at.min(next_resync));
            tokio::select! {
                biased;
                () = cancelled(&mut shutdown) => break,
                Some(joined) = tasks.join_next_with_id() => self.settle(&mut schedule, joined),
                () = sleep_until(wake) => {
                    let now = Instant::now();
                    let keys = if now >= next_resync {
                        next_resync = now + self.resync;
                        match self.store.list() {
                            Ok(keys) => keys,
                            Err(e) => {
                                warn!(error = %e, "failed to list desired issues");
                                continue;
                            }
                        }
                    } else {
                        schedule.due_retries(now)
                    };
                    self.dispatch(&mut schedule, &mut tasks, keys, &shutdown);
                }
            }
        }

        info!(in_flight = tasks.len(), "controller stopping");
        while let Some(joined) = tasks.join_next_with_id().await {
            self.settle(&mut schedule, joined);
        }
    }

    fn dispatch(
        &self,
        schedule: &mut Schedule,
        tasks: &mut JoinSet<Outcome>,
        keys: Vec<ObjectKey>,
        shutdown: &watch::Receiver<bool>,
    ) {
        let now = Instant::now();
        for key in keys {
            if !schedule.admit(&key, now, self.version_of(&key)) {
                debug!(key = %key, "skipping, not due");
                continue;
            }
            let reconciler = Arc::clone(&self.reconciler);
            let cancel = shutdown.clone();
            let task_key = key.clone();
            let handle =
                tasks.spawn(async move { reconciler.reconcile_until(&task_key, cancel).await });
            schedule.in_flight.insert(handle.id(), key);
        }
    }

    fn settle(&self, schedule: &mut Schedule, joined: Result<(Id, Outcome), JoinError>) {
        let (id, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                let key = schedule.in_flight.remove(&e.id());
                error!(key = ?key, error = %e, "reconcile task failed");
                return;
            }
        };
        let Some(key) = schedule.in_flight.remove(&id) else {
            return;
        };
        if let Outcome::Fatal(e) = &outcome {
            warn!(key = %key, error = %e, "parking until the object changes");
        }
        let version = self.version_of(&key);
        schedule.record(key, &outcome, Instant::now(), version);
    }

    fn version_of(&self, key: &ObjectKey) -> Option<u64> {
        match self.store.get(key) {
            Ok(issue) => issue.map(|i| i.metadata.resource_version),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read desired issue");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FailureMode, InMemoryIssueStore, InMemoryIssueTracker};
    use crate::error::{ReconcileError, RemoteOp};
    use crate::model::{IssueSpec, RepoRef, Token};
    use crate::ports::IssueTracker;
    use crate::reconcile::{Change, ReconcilerConfig};

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    fn spec(repo: &str, title: &str) -> IssueSpec {
        IssueSpec {
            repo: repo.into(),
            title: title.into(),
            description: "D".into(),
        }
    }

    fn controller() -> (Arc<InMemoryIssueTracker>, Arc<InMemoryIssueStore>, Controller) {
        let tracker = Arc::new(InMemoryIssueTracker::new());
        let store = Arc::new(InMemoryIssueStore::new());
        let reconciler = Reconciler::new(
            Arc::clone(&tracker) as Arc<dyn IssueTracker>,
            Arc::clone(&store) as Arc<dyn IssueStore>,
            Token::new("t"),
            ReconcilerConfig::default(),
        );
        let controller = Controller::new(
            Arc::new(reconciler),
            Arc::clone(&store) as Arc<dyn IssueStore>,
            Duration::from_secs(60),
        );
        (tracker, store, controller)
    }

    #[test]
    fn retry_deadline_gates_admission() {
        let mut schedule = Schedule::default();
        let now = Instant::now();
        schedule.record(key("a"), &Outcome::RetryAfter(Duration::from_secs(5)), now, Some(1));

        assert!(!schedule.admit(&key("a"), now + Duration::from_secs(1), Some(1)));
        assert!(schedule.due_retries(now + Duration::from_secs(1)).is_empty());
        assert_eq!(schedule.due_retries(now + Duration::from_secs(5)), vec![key("a")]);
        assert!(schedule.admit(&key("a"), now + Duration::from_secs(5), Some(1)));
        assert!(schedule.earliest_retry().is_none());
    }

    #[test]
    fn fatal_key_stays_parked_until_version_moves() {
        let mut schedule = Schedule::default();
        let now = Instant::now();
        let fatal = Outcome::Fatal(ReconcileError::InvalidRepo {
            repo: "x".into(),
            reason: "bad".into(),
        });
        schedule.record(key("a"), &fatal, now, Some(3));

        assert!(!schedule.admit(&key("a"), now, Some(3)));
        assert!(schedule.admit(&key("a"), now, Some(4)));
        assert!(schedule.admit(&key("a"), now, Some(4)));
    }

    #[tokio::test]
    async fn run_once_reports_every_key_in_order() {
        let (tracker, store, controller) = controller();
        store.apply(&key("b"), spec("octo/widgets", "B")).unwrap();
        store.apply(&key("a"), spec("octo/widgets", "A")).unwrap();
        store.apply(&key("c"), spec("bad repo", "C")).unwrap();

        let outcomes = controller.run_once().await.unwrap();
        let keys: Vec<_> = outcomes.iter().map(|(k, _)| k.name.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert!(matches!(
            &outcomes[0].1,
            Outcome::Done(r) if r.changes.contains(&Change::FinalizerAdded)
        ));
        assert!(matches!(&outcomes[2].1, Outcome::Fatal(_)));
        assert_eq!(tracker.issues(&RepoRef::parse("octo/widgets").unwrap()).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_failed_passes_until_shutdown() {
        let (tracker, store, controller) = controller();
        store.apply(&key("a"), spec("octo/widgets", "A")).unwrap();
        tracker.fail_on(RemoteOp::Create, FailureMode::Before);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { controller.run(rx).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(tracker.call_count(RemoteOp::Create), 1);
        assert!(tracker.issues(&RepoRef::parse("octo/widgets").unwrap()).is_empty());

        tracker.clear_failures();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(tracker.call_count(RemoteOp::Create), 2);
        assert_eq!(tracker.issues(&RepoRef::parse("octo/widgets").unwrap()).len(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
