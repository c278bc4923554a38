//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the reconcile core and an
//! external system: the remote issue tracker and the store that owns the
//! desired issues. Implementations live in `src/adapters/`.

pub mod issues;
pub mod store;

pub use issues::{IssueTracker, TrackerFuture};
pub use store::{IssueStore, StatusPatch};
