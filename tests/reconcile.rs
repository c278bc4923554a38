//! Behavioral tests for the reconciliation engine on in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use issue_sync::adapters::memory::{FailureMode, InMemoryIssueStore, InMemoryIssueTracker};
use issue_sync::error::{ReconcileError, RemoteError, RemoteOp};
use issue_sync::model::{DesiredIssue, IssueSpec, IssueState, ObjectKey, RepoRef, Token};
use issue_sync::ports::{IssueStore, IssueTracker};
use issue_sync::reconcile::{Change, Outcome, Reconciler, ReconcilerConfig, FINALIZER};

const REPO: &str = "octo/widgets";

struct Harness {
    tracker: Arc<InMemoryIssueTracker>,
    store: Arc<InMemoryIssueStore>,
    reconciler: Reconciler,
    key: ObjectKey,
    repo: RepoRef,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    fn with_config(config: ReconcilerConfig) -> Self {
        let tracker = Arc::new(InMemoryIssueTracker::new());
        let store = Arc::new(InMemoryIssueStore::new());
        let reconciler = Reconciler::new(
            Arc::clone(&tracker) as Arc<dyn IssueTracker>,
            Arc::clone(&store) as Arc<dyn IssueStore>,
            Token::new("ghp_test"),
            config,
        );
        Self {
            tracker,
            store,
            reconciler,
            key: ObjectKey::new("default", "bug"),
            repo: RepoRef::parse(REPO).unwrap(),
        }
    }

    fn declare(&self, title: &str, description: &str) -> DesiredIssue {
        let spec = IssueSpec {
            repo: REPO.into(),
            title: title.into(),
            description: description.into(),
        };
        self.store.apply(&self.key, spec).unwrap()
    }

    fn stored(&self) -> Option<DesiredIssue> {
        self.store.get(&self.key).unwrap()
    }

    fn remote_titled(&self, title: &str) -> Vec<issue_sync::model::RemoteIssue> {
        self.tracker.issues(&self.repo).into_iter().filter(|i| i.title == title).collect()
    }

    async fn pass(&self) -> Outcome {
        self.reconciler.reconcile(&self.key).await
    }
}

fn changes(outcome: &Outcome) -> &[Change] {
    match outcome {
        Outcome::Done(report) => &report.changes,
        other => panic!("expected Done, got {other:?}"),
    }
}

#[tokio::test]
async fn create_is_idempotent_across_passes() {
    let h = Harness::new();
    h.declare("T", "D");

    h.pass().await;
    h.pass().await;

    assert_eq!(h.remote_titled("T").len(), 1);
    assert_eq!(h.tracker.call_count(RemoteOp::Create), 1);
}

#[tokio::test]
async fn lost_create_response_does_not_duplicate() {
    let h = Harness::new();
    h.declare("T", "D");
    h.tracker.fail_on(RemoteOp::Create, FailureMode::AfterApply);

    assert_eq!(h.pass().await, Outcome::RetryAfter(Duration::from_secs(5)));
    h.tracker.clear_failures();
    let outcome = h.pass().await;

    assert_eq!(changes(&outcome), [Change::StatusPatched]);
    assert_eq!(h.remote_titled("T").len(), 1);
}

#[tokio::test]
async fn drift_is_corrected_with_one_edit() {
    let h = Harness::new();
    h.tracker.seed(&h.repo, "T", "A", IssueState::Open);
    h.declare("T", "B");

    let outcome = h.pass().await;

    assert!(changes(&outcome).contains(&Change::Edited { number: 1 }));
    let remote = h.remote_titled("T");
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].description(), "B");
    assert_eq!(h.stored().unwrap().status.last_update_timestamp, Some(remote[0].updated_at));
}

#[tokio::test]
async fn empty_body_matches_empty_description() {
    let h = Harness::new();
    h.tracker.seed(&h.repo, "T", "", IssueState::Open);
    h.declare("T", "");

    h.pass().await;
    assert_eq!(h.tracker.call_count(RemoteOp::Edit), 0);
}

#[tokio::test]
async fn converged_object_makes_no_mutations() {
    let h = Harness::new();
    h.tracker.seed(&h.repo, "T", "D", IssueState::Open);
    h.declare("T", "D");

    h.pass().await;
    let after_first = h.stored().unwrap();
    for _ in 0..3 {
        let outcome = h.pass().await;
        assert!(changes(&outcome).is_empty());
    }

    assert_eq!(h.tracker.call_count(RemoteOp::Create), 0);
    assert_eq!(h.tracker.call_count(RemoteOp::Edit), 0);
    assert_eq!(h.tracker.call_count(RemoteOp::Close), 0);
    assert_eq!(h.stored().unwrap(), after_first);
}

#[tokio::test]
async fn closed_remote_issue_is_matched_not_recreated() {
    let h = Harness::new();
    h.tracker.seed(&h.repo, "T", "D", IssueState::Closed);
    h.declare("T", "D");

    h.pass().await;

    assert_eq!(h.tracker.call_count(RemoteOp::Create), 0);
    assert_eq!(h.stored().unwrap().status.state, Some(IssueState::Closed));
}

#[tokio::test]
async fn deletion_closes_then_releases_finalizer() {
    let h = Harness::new();
    h.declare("T", "D");
    h.pass().await;
    h.store.request_deletion(&h.key, Utc::now()).unwrap();

    let outcome = h.pass().await;

    assert_eq!(changes(&outcome), [Change::Closed { number: 1 }, Change::FinalizerRemoved]);
    assert_eq!(h.remote_titled("T")[0].state, IssueState::Closed);
    assert!(h.stored().is_none());
    assert_eq!(h.tracker.issues(&h.repo).len(), 1);
}

#[tokio::test]
async fn failed_close_keeps_finalizer_and_open_issue() {
    let h = Harness::new();
    h.declare("T", "D");
    h.pass().await;
    h.store.request_deletion(&h.key, Utc::now()).unwrap();
    h.tracker.fail_on(RemoteOp::Close, FailureMode::Before);

    assert!(matches!(h.pass().await, Outcome::RetryAfter(_)));

    let stored = h.stored().unwrap();
    assert!(stored.metadata.finalizers.iter().any(|f| f == FINALIZER));
    assert_eq!(h.remote_titled("T")[0].state, IssueState::Open);
}

#[tokio::test]
async fn deletion_without_remote_issue_skips_close() {
    let h = Harness::new();
    let mut issue = h.declare("T", "D");
    issue.metadata.finalizers.push(FINALIZER.into());
    h.store.update(&issue).unwrap();
    h.store.request_deletion(&h.key, Utc::now()).unwrap();

    let outcome = h.pass().await;

    assert_eq!(changes(&outcome), [Change::CloseSkipped, Change::FinalizerRemoved]);
    assert_eq!(h.tracker.call_count(RemoteOp::Close), 0);
    assert!(h.stored().is_none());
}

#[tokio::test]
async fn deleting_without_finalizer_is_a_noop() {
    let h = Harness::new();
    let mut issue = h.declare("T", "D");
    issue.metadata.finalizers.push("owner.hold".into());
    h.store.update(&issue).unwrap();
    h.store.request_deletion(&h.key, Utc::now()).unwrap();

    let outcome = h.pass().await;

    assert!(changes(&outcome).is_empty());
    assert_eq!(h.tracker.call_count(RemoteOp::Close), 0);
    assert!(h.stored().unwrap().is_being_deleted());
}

#[tokio::test]
async fn projection_leaves_spec_and_finalizers_alone() {
    let h = Harness::new();
    h.tracker.seed(&h.repo, "T", "D", IssueState::Open);
    let declared = h.declare("T", "D");

    h.pass().await;

    let stored = h.stored().unwrap();
    assert_eq!(stored.spec, declared.spec);
    assert_eq!(stored.metadata.finalizers, vec![FINALIZER]);
    assert_eq!(stored.status.state, Some(IssueState::Open));
}

#[tokio::test]
async fn failed_create_leaves_status_untouched_then_converges() {
    let h = Harness::new();
    h.declare("T", "D");
    h.tracker.fail_on(RemoteOp::Create, FailureMode::Before);

    assert!(matches!(h.pass().await, Outcome::RetryAfter(_)));
    let stored = h.stored().unwrap();
    assert!(stored.status.state.is_none());
    assert!(stored.metadata.finalizers.iter().any(|f| f == FINALIZER));
    assert!(h.tracker.issues(&h.repo).is_empty());

    h.tracker.clear_failures();
    let outcome = h.pass().await;
    assert_eq!(changes(&outcome), [Change::Created { number: 1 }, Change::StatusPatched]);
    assert_eq!(h.remote_titled("T").len(), 1);
}

#[tokio::test]
async fn malformed_repo_is_fatal() {
    let h = Harness::new();
    let spec = IssueSpec {
        repo: "widgets".into(),
        title: "T".into(),
        description: "D".into(),
    };
    h.store.apply(&h.key, spec).unwrap();

    let outcome = h.pass().await;

    assert!(matches!(outcome, Outcome::Fatal(ReconcileError::InvalidRepo { .. })));
    assert!(h.tracker.calls().is_empty());
}

#[tokio::test]
async fn stale_write_is_a_retryable_conflict() {
    let h = Harness::new();
    h.declare("T", "D");
    h.store.force_conflicts(1);

    let err = h.reconciler.try_reconcile(&h.key).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(ref e) if e.is_conflict()));
    assert!(err.is_retryable());
    assert_eq!(h.tracker.call_count(RemoteOp::Create), 0);

    let outcome = h.pass().await;
    assert!(changes(&outcome).contains(&Change::FinalizerAdded));
}

#[tokio::test(start_paused = true)]
async fn slow_call_times_out_without_status_write() {
    let h = Harness::with_config(ReconcilerConfig {
        call_timeout: Duration::from_secs(2),
        retry_after: Duration::from_secs(1),
    });
    h.declare("T", "D");
    h.tracker.set_delay(Some(Duration::from_secs(10)));

    let err = h.reconciler.try_reconcile(&h.key).await.unwrap_err();

    assert_eq!(
        err,
        ReconcileError::Remote(RemoteError::Timeout {
            op: RemoteOp::Find,
            timeout_ms: 2000
        })
    );
    assert!(h.stored().unwrap().status.state.is_none());
    assert_eq!(h.pass().await, Outcome::RetryAfter(Duration::from_secs(1)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_in_flight_pass() {
    let h = Harness::new();
    h.declare("T", "D");
    h.tracker.set_delay(Some(Duration::from_secs(10)));
    let (tx, rx) = watch::channel(false);

    let cancel = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
    };
    let (outcome, ()) = tokio::join!(h.reconciler.reconcile_until(&h.key, rx), cancel);

    assert_eq!(outcome, Outcome::RetryAfter(Duration::from_secs(5)));
    assert!(h.tracker.issues(&h.repo).is_empty());
    assert!(h.stored().unwrap().status.state.is_none());
}
