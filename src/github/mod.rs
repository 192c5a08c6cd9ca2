//! GitHub API facade
//!
//! Exposes the two calls the service needs: the authenticated user's
//! profile and issue comment creation.

mod client;
mod types;

pub use client::GitHubClient;
pub use types::{GitHubUser, IssueComment, NewIssueComment};
