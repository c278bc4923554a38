//! Live adapters for real external interactions.

pub mod github;
pub mod store;

pub use github::GithubIssueTracker;
pub use store::YamlIssueStore;
