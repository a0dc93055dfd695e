//! Wire shapes of the GitHub REST endpoints prman reads, and their
//! conversion into the crate's own types.
//!
//! Only the fields the pipeline uses are declared; mergeable state, review
//! verdicts and status states stay raw strings here so unknown values reach
//! the report untouched.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::*;

#[derive(Debug, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPullRequestLinks {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
    pub number: u64,
    pub html_url: String,
    pub pull_request: Option<ApiPullRequestLinks>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRepo {
    pub name: String,
    pub owner: ApiUser,
}

#[derive(Debug, Deserialize)]
pub struct ApiBranch {
    pub sha: String,
    pub repo: Option<ApiRepo>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPullRequest {
    pub number: u64,
    pub url: String,
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub mergeable_state: Option<String>,
    #[serde(default)]
    pub statuses_url: Option<String>,
    pub head: ApiBranch,
    pub base: ApiBranch,
}

#[derive(Debug, Deserialize)]
pub struct ApiReview {
    pub id: u64,
    pub user: Option<ApiUser>,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
    pub state: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiReviewComment {
    pub id: u64,
    pub user: Option<ApiUser>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRepository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub archived: bool,
}

fn login_or_ghost(user: Option<ApiUser>) -> String {
    // GitHub reports deleted accounts as a null user.
    user.map_or_else(|| "ghost".to_string(), |u| u.login)
}

impl From<ApiIssue> for SearchItem {
    fn from(issue: ApiIssue) -> Self {
        SearchItem {
            number: issue.number,
            html_url: issue.html_url,
            pull_request_url: issue.pull_request.map(|links| links.url),
        }
    }
}

impl TryFrom<ApiPullRequest> for PullDetails {
    type Error = anyhow::Error;

    fn try_from(pr: ApiPullRequest) -> Result<Self> {
        let base = pr
            .base
            .repo
            .with_context(|| format!("Pull request {} has no base repository", pr.url))?;

        Ok(PullDetails {
            number: pr.number,
            url: pr.url,
            html_url: pr.html_url,
            state: PullState::from_api(&pr.state),
            merged: pr.merged.unwrap_or(false),
            mergeable_state: pr.mergeable_state,
            head_sha: pr.head.sha,
            base_repo: Repo::new(base.owner.login, base.name)?,
            statuses_url: pr.statuses_url,
        })
    }
}

impl From<ApiReview> for Review {
    fn from(review: ApiReview) -> Self {
        Review {
            id: review.id,
            reviewer: login_or_ghost(review.user),
            verdict: ReviewVerdict::from_api(&review.state),
        }
    }
}

impl From<ApiStatus> for Status {
    fn from(status: ApiStatus) -> Self {
        Status {
            context: status.context.unwrap_or_default(),
            state: StatusState::from_api(&status.state),
            description: status.description,
            target_url: status.target_url,
        }
    }
}

impl From<ApiReviewComment> for ReviewComment {
    fn from(comment: ApiReviewComment) -> Self {
        ReviewComment {
            id: comment.id,
            author: login_or_ghost(comment.user),
            body: comment.body,
            path: comment.path,
        }
    }
}

impl From<ApiRepository> for Repository {
    fn from(repo: ApiRepository) -> Self {
        Repository {
            name: repo.name,
            full_name: repo.full_name,
            archived: repo.archived,
        }
    }
}
