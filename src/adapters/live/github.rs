//! Live adapter for the `IssueTracker` port using the GitHub REST API.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RemoteError, RemoteOp};
use crate::model::{IssueState, RemoteIssue, RepoRef, Token};
use crate::ports::{IssueTracker, TrackerFuture};

/// Default GitHub API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("issue-sync/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: usize = 100;

/// Live issue tracker that talks to GitHub.
pub struct GithubIssueTracker {
    client: Client,
    base_url: String,
}

impl GithubIssueTracker {
    /// Creates a tracker against `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Transport {
                op: RemoteOp::Find,
                reason: e.to_string(),
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn issues_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}/issues", self.base_url, repo.owner, repo.name)
    }

    fn request(&self, method: Method, url: &str, token: &Token) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token.expose())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    async fn patch_issue(
        &self,
        op: RemoteOp,
        token: &Token,
        repo: &RepoRef,
        number: u64,
        body: &IssuePatch<'_>,
    ) -> Result<RemoteIssue, RemoteError> {
        let url = format!("{}/{number}", self.issues_url(repo));
        let response = self
            .request(Method::PATCH, &url, token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(op, &e))?;
        decode(op, expect_status(op, response, StatusCode::OK).await?).await
    }
}

/// Request body for issue creation.
#[derive(Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
}

/// Request body for issue edits; `state` is only sent when closing.
#[derive(Serialize)]
struct IssuePatch<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<IssueState>,
}

/// One entry of the issue listing. Pull requests carry `pull_request`.
#[derive(Deserialize)]
struct ListedIssue {
    #[serde(flatten)]
    issue: RemoteIssue,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

fn transport(op: RemoteOp, err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Transport {
            op,
            reason: format!("request timed out: {err}"),
        }
    } else {
        RemoteError::Transport {
            op,
            reason: err.to_string(),
        }
    }
}

async fn expect_status(
    op: RemoteOp,
    response: Response,
    expected: StatusCode,
) -> Result<Response, RemoteError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        op,
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: for<'de> Deserialize<'de>>(
    op: RemoteOp,
    response: Response,
) -> Result<T, RemoteError> {
    let text = response.text().await.map_err(|e| transport(op, &e))?;
    serde_json::from_str(&text).map_err(|e| RemoteError::Decode {
        op,
        reason: e.to_string(),
    })
}

impl IssueTracker for GithubIssueTracker {
    fn find<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
    ) -> TrackerFuture<'a, Option<RemoteIssue>> {
        Box::pin(async move {
            let op = RemoteOp::Find;
            let url = self.issues_url(repo);
            for page in 1.. {
                let response = self
                    .request(Method::GET, &url, token)
                    .query(&[
                        ("state", "all".to_string()),
                        ("per_page", PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                    ])
                    .send()
                    .await
                    .map_err(|e| transport(op, &e))?;
                let listed: Vec<ListedIssue> =
                    decode(op, expect_status(op, response, StatusCode::OK).await?).await?;
                let page_len = listed.len();
                debug!(repo = %repo, page, issues = page_len, "listed issues");

                if let Some(hit) = listed
                    .into_iter()
                    .filter(|entry| entry.pull_request.is_none())
                    .map(|entry| entry.issue)
                    .find(|issue| issue.title == title)
                {
                    return Ok(Some(hit));
                }
                if page_len < PAGE_SIZE {
                    break;
                }
            }
            Ok(None)
        })
    }

    fn create<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let op = RemoteOp::Create;
            let response = self
                .request(Method::POST, &self.issues_url(repo), token)
                .json(&NewIssue {
                    title,
                    body: description,
                })
                .send()
                .await
                .map_err(|e| transport(op, &e))?;
            decode(op, expect_status(op, response, StatusCode::CREATED).await?).await
        })
    }

    fn edit<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        number: u64,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let body = IssuePatch {
                title,
                body: description,
                state: None,
            };
            self.patch_issue(RemoteOp::Edit, token, repo, number, &body).await
        })
    }

    fn close<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        number: u64,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let body = IssuePatch {
                title,
                body: description,
                state: Some(IssueState::Closed),
            };
            self.patch_issue(RemoteOp::Close, token, repo, number, &body).await
        })
    }
}
