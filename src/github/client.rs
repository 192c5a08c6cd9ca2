//! GitHub REST API client bound to one user's OAuth token

use std::time::Instant;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::types::{ApiErrorBody, GitHubUser, IssueComment, NewIssueComment};
use crate::error::UpstreamApiError;
use crate::metrics::observe_upstream;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// API client for a single signed-in user
///
/// Built per request from the session's token; the underlying
/// `reqwest::Client` (connection pool, timeouts) is shared.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base_url: String,
    token: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, api_base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
    }

    /// Fetch the profile of the token owner (`GET /user`)
    pub async fn get_authenticated_user(&self) -> Result<GitHubUser, UpstreamApiError> {
        let started = Instant::now();
        let request = self.authorized(self.http.get(format!("{}/user", self.api_base_url)));
        let result = send_json(request).await;
        observe_upstream("get_user", started.elapsed());
        result
    }

    /// Post a comment on an issue or pull request
    /// (`POST /repos/{owner}/{repo}/issues/{number}/comments`)
    pub async fn create_issue_comment(
        &self,
        comment: &NewIssueComment,
    ) -> Result<IssueComment, UpstreamApiError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base_url,
            urlencoding::encode(&comment.owner),
            urlencoding::encode(&comment.repo),
            urlencoding::encode(&comment.number),
        );

        let started = Instant::now();
        let request = self
            .authorized(self.http.post(url))
            .json(&serde_json::json!({ "body": comment.body }));
        let result = send_accepted(request).await;
        observe_upstream("create_issue_comment", started.elapsed());
        result
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, UpstreamApiError> {
    let response = request.send().await?;
    let response = error_for_status(response).await?;
    Ok(response.json::<T>().await?)
}

/// Like [`send_json`], but any 2xx counts as success even if the body is unreadable
async fn send_accepted<T: DeserializeOwned + Default>(
    request: RequestBuilder,
) -> Result<T, UpstreamApiError> {
    let response = error_for_status(request.send().await?).await?;

    let parsed = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    Ok(parsed.unwrap_or_else(|error| {
        tracing::warn!(%error, "Accepted GitHub response had an unexpected body");
        T::default()
    }))
}

/// Turn a non-success response into `UpstreamApiError`, keeping GitHub's message
async fn error_for_status(response: Response) -> Result<Response, UpstreamApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = status.canonical_reason().unwrap_or("GitHub API error");
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => fallback.to_string(),
    };

    Err(UpstreamApiError::new(status.as_u16(), message))
}
