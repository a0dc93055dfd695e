use std::{fmt, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Repository identity as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            anyhow::bail!("Repository owner and name must be non-empty");
        }
        Ok(Self { owner, name })
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A pull request addressed by repository and number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRef {
    pub repo: Repo,
    pub number: u64,
}

impl PullRef {
    /// Parses a REST pull request link such as
    /// `https://api.github.com/repos/owner/repo/pulls/123`.
    ///
    /// Any path prefix before `repos` is accepted so that links from GitHub
    /// Enterprise (`/api/v3/repos/...`) resolve the same way.
    pub fn parse_api_url(link: &str) -> Result<Self> {
        let url =
            url::Url::parse(link).with_context(|| format!("Failed to parse URL: '{link}'"))?;

        let segments: Vec<&str> = url
            .path_segments()
            .context("Cannot parse URL path")?
            .filter(|s| !s.is_empty())
            .collect();

        let start = segments
            .iter()
            .position(|s| *s == "repos")
            .with_context(|| format!("Pull request link has no 'repos' segment: '{link}'"))?;

        // ["repos", "owner", "repo", "pulls", "123"]
        let tail = &segments[start..];
        if tail.len() != 5 || tail[3] != "pulls" {
            anyhow::bail!(
                "Pull request link must look like .../repos/owner/repo/pulls/123, got: '{link}'"
            );
        }

        let number: u64 = tail[4]
            .parse()
            .with_context(|| format!("Invalid PR number in link: '{link}'"))?;

        Ok(Self {
            repo: Repo::new(tail[1], tail[2])?,
            number,
        })
    }
}

impl fmt::Display for PullRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// One issue-search hit. Only hits carrying a pull request link are pull
/// requests.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchItem {
    pub number: u64,
    pub html_url: String,
    pub pull_request_url: Option<String>,
}

impl SearchItem {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request_url.is_some()
    }

    /// Resolves the hit to the pull request it links to.
    pub fn pull_ref(&self) -> Result<PullRef> {
        let link = self
            .pull_request_url
            .as_deref()
            .with_context(|| format!("Search result {} is not a pull request", self.html_url))?;
        PullRef::parse_api_url(link)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    Open,
    Closed,
}

impl PullState {
    /// Anything other than `open` is treated as closed.
    pub fn from_api(state: &str) -> Self {
        if state == "open" {
            PullState::Open
        } else {
            PullState::Closed
        }
    }
}

/// Pull request details as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PullDetails {
    pub number: u64,
    /// Canonical API URL; reports are ordered by this string.
    pub url: String,
    pub html_url: String,
    pub state: PullState,
    pub merged: bool,
    pub mergeable_state: Option<String>,
    pub head_sha: String,
    /// Repository the pull request targets; statuses live here.
    pub base_repo: Repo,
    pub statuses_url: Option<String>,
}

impl PullDetails {
    pub fn pull_ref(&self) -> PullRef {
        PullRef {
            repo: self.base_repo.clone(),
            number: self.number,
        }
    }
}

/// A reviewer's recorded judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    Other(String),
}

impl ReviewVerdict {
    pub fn from_api(state: &str) -> Self {
        match state {
            "APPROVED" => ReviewVerdict::Approved,
            "CHANGES_REQUESTED" => ReviewVerdict::ChangesRequested,
            "COMMENTED" => ReviewVerdict::Commented,
            "DISMISSED" => ReviewVerdict::Dismissed,
            "PENDING" => ReviewVerdict::Pending,
            other => ReviewVerdict::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReviewVerdict::Approved => "APPROVED",
            ReviewVerdict::ChangesRequested => "CHANGES_REQUESTED",
            ReviewVerdict::Commented => "COMMENTED",
            ReviewVerdict::Dismissed => "DISMISSED",
            ReviewVerdict::Pending => "PENDING",
            ReviewVerdict::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: u64,
    pub reviewer: String,
    pub verdict: ReviewVerdict,
}

/// State of a commit status as reported by an external system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusState {
    Success,
    Pending,
    Failure,
    Error,
    Other(String),
}

impl StatusState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "success" => StatusState::Success,
            "pending" => StatusState::Pending,
            "failure" => StatusState::Failure,
            "error" => StatusState::Error,
            other => StatusState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StatusState::Success => "success",
            StatusState::Pending => "pending",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
            StatusState::Other(raw) => raw,
        }
    }

    /// Neither pending nor successful.
    pub fn is_failing(&self) -> bool {
        !matches!(self, StatusState::Success | StatusState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub context: String,
    pub state: StatusState,
    pub description: Option<String>,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewComment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub archived: bool,
}

/// A pull request together with everything the report needs about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pull {
    pub pr: PullDetails,
    pub reviews: Vec<Review>,
    pub statuses: Vec<Status>,
    pub api_calls: usize,
}

/// Outcome of a gateway operation and the number of requests it spent,
/// whether or not it succeeded.
#[derive(Debug)]
pub struct Counted<T> {
    pub calls: usize,
    pub result: Result<T>,
}

impl<T> Counted<T> {
    pub fn new(calls: usize, result: Result<T>) -> Self {
        Self { calls, result }
    }

    pub fn ok(calls: usize, value: T) -> Self {
        Self::new(calls, Ok(value))
    }

    pub fn err(calls: usize, error: anyhow::Error) -> Self {
        Self::new(calls, Err(error))
    }
}

/// What to search for and how hard to fan out.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Full search query, including the `is:pr` qualifier.
    pub query: String,
    pub api_base: String,
    pub max_concurrent: usize,
    pub task_timeout: Duration,
}

/// Every pull request found, plus the API calls spent finding them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub pulls: Vec<Pull>,
    pub api_calls: usize,
    pub api_host: String,
}

/// Code-hosting API operations the pipeline relies on.
///
/// Every operation reports the number of requests it made, including the
/// ones made before a failure.
#[async_trait]
pub trait Forge {
    /// Host name shown in the report summary.
    fn host(&self) -> &str;

    async fn search_issues(&self, query: &str) -> Counted<Vec<SearchItem>>;

    async fn get_pull_request(&self, pull: &PullRef) -> Counted<PullDetails>;

    async fn list_reviews(&self, pull: &PullRef) -> Counted<Vec<Review>>;

    async fn list_statuses(&self, repo: &Repo, sha: &str) -> Counted<Vec<Status>>;

    async fn list_review_comments(
        &self,
        pull: &PullRef,
        review_id: u64,
    ) -> Counted<Vec<ReviewComment>>;

    /// Lists an organisation's repositories, skipping archived ones.
    async fn list_org_repositories(&self, org: &str) -> Counted<Vec<Repository>>;
}
