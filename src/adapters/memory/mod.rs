//! In-memory adapters used by tests and offline runs.

pub mod issues;
pub mod store;

pub use issues::{FailureMode, InMemoryIssueTracker};
pub use store::InMemoryIssueStore;
