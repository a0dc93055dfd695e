use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    rest::{ApiIssue, ApiPullRequest, ApiRepository, ApiReview, ApiReviewComment, ApiStatus},
    types::*,
};

pub const TOKEN_ENV_VAR: &str = "GITHUB_API_TOKEN";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const PER_PAGE: &str = "100";

pub fn get_github_token() -> Result<String> {
    let token = std::env::var(TOKEN_ENV_VAR)
        .with_context(|| format!("{TOKEN_ENV_VAR} must be set to a GitHub API token"))?;
    let token = token.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("{TOKEN_ENV_VAR} is set but empty");
    }

    Ok(token)
}

/// The GitHub REST API, reached through Octocrab.
pub struct GitHub {
    client: Octocrab,
    host: String,
}

impl GitHub {
    pub fn new(client: Octocrab, api_base: &str) -> Result<Self> {
        Ok(Self {
            client,
            host: display_host(api_base)?,
        })
    }

    /// Creates an authenticated client for the API rooted at `api_base`.
    pub fn connect(token: String, api_base: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token)
            .base_uri(api_base)
            .with_context(|| format!("Invalid API base URL: '{api_base}'"))?
            .build()
            .context("Failed to create GitHub client")?;
        Self::new(client, api_base)
    }

    /// Fetches `route` and every following page, bumping `calls` once per
    /// request actually made.
    async fn collect_pages<T>(
        &self,
        route: &str,
        params: &[(&str, &str)],
        calls: &mut usize,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        *calls += 1;
        let mut page: Page<T> = self
            .client
            .get(route, Some(params))
            .await
            .with_context(|| format!("GET {route} failed"))?;
        let mut items = page.take_items();

        while page.next.is_some() {
            *calls += 1;
            match self
                .client
                .get_page::<T>(&page.next)
                .await
                .with_context(|| format!("Fetching page {} of {route} failed", *calls))?
            {
                Some(next) => page = next,
                None => break,
            }
            items.extend(page.take_items());
        }

        debug!(route, pages = *calls, items = items.len(), "paginated fetch complete");
        Ok(items)
    }

    async fn list_all<A, T>(&self, route: String, params: &[(&str, &str)]) -> Counted<Vec<T>>
    where
        A: DeserializeOwned + Into<T>,
    {
        let mut calls = 0;
        let result = self
            .collect_pages::<A>(&route, params, &mut calls)
            .await
            .map(|items| items.into_iter().map(Into::into).collect());
        Counted::new(calls, result)
    }
}

/// Host shown in the report: the public API is credited to github.com.
fn display_host(api_base: &str) -> Result<String> {
    let url =
        url::Url::parse(api_base).with_context(|| format!("Invalid API base URL: '{api_base}'"))?;
    let host = url
        .host_str()
        .with_context(|| format!("API base URL has no host: '{api_base}'"))?;

    Ok(host.strip_prefix("api.").unwrap_or(host).to_string())
}

fn repo_path(repo: &Repo) -> String {
    format!("/repos/{}/{}", repo.owner, repo.name)
}

#[async_trait]
impl Forge for GitHub {
    fn host(&self) -> &str {
        &self.host
    }

    async fn search_issues(&self, query: &str) -> Counted<Vec<SearchItem>> {
        let params = [
            ("q", query),
            ("sort", "created"),
            ("order", "asc"),
            ("per_page", PER_PAGE),
        ];
        self.list_all::<ApiIssue, SearchItem>("/search/issues".to_string(), &params)
            .await
    }

    async fn get_pull_request(&self, pull: &PullRef) -> Counted<PullDetails> {
        let route = format!("{}/pulls/{}", repo_path(&pull.repo), pull.number);
        let result = self
            .client
            .get::<ApiPullRequest, _, ()>(&route, None)
            .await
            .with_context(|| format!("GET {route} failed"))
            .and_then(PullDetails::try_from);
        Counted::new(1, result)
    }

    async fn list_reviews(&self, pull: &PullRef) -> Counted<Vec<Review>> {
        let route = format!("{}/pulls/{}/reviews", repo_path(&pull.repo), pull.number);
        self.list_all::<ApiReview, Review>(route, &[("per_page", PER_PAGE)])
            .await
    }

    async fn list_statuses(&self, repo: &Repo, sha: &str) -> Counted<Vec<Status>> {
        let route = format!("{}/commits/{}/statuses", repo_path(repo), sha);
        self.list_all::<ApiStatus, Status>(route, &[("per_page", PER_PAGE)])
            .await
    }

    async fn list_review_comments(
        &self,
        pull: &PullRef,
        review_id: u64,
    ) -> Counted<Vec<ReviewComment>> {
        let route = format!(
            "{}/pulls/{}/reviews/{}/comments",
            repo_path(&pull.repo),
            pull.number,
            review_id
        );
        self.list_all::<ApiReviewComment, ReviewComment>(route, &[("per_page", PER_PAGE)])
            .await
    }

    async fn list_org_repositories(&self, org: &str) -> Counted<Vec<Repository>> {
        let route = format!("/orgs/{org}/repos");
        let counted = self
            .list_all::<ApiRepository, Repository>(route, &[("per_page", PER_PAGE)])
            .await;
        let result = counted
            .result
            .map(|repos| repos.into_iter().filter(|repo| !repo.archived).collect());
        Counted::new(counted.calls, result)
    }
}
