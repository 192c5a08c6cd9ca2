//! GitHub REST API payloads

use serde::{Deserialize, Serialize};

/// Authenticated user profile (`GET /user`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Comment to create on an issue or pull request
#[derive(Debug, Clone)]
pub struct NewIssueComment {
    pub owner: String,
    pub repo: String,
    pub number: String,
    pub body: String,
}

/// Created comment metadata
///
/// Every field is optional: a 2xx answer means the comment exists, whatever
/// the body looks like.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueComment {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}
