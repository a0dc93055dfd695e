//! prman: a one-line-per-PR status report for GitHub searches.
//!
//! Searches GitHub for pull requests, fetches each match's details, reviews
//! and commit statuses concurrently, then renders a sorted, colour-coded
//! summary of merge state, approval and failing checks.

pub mod aggregate;
pub mod cli;
pub mod display;
pub mod github;
pub mod meter;
pub mod query;
pub mod rest;
pub mod types;

pub use aggregate::aggregate_pull;
pub use cli::{ColorMode, ReportOptions, parse_args};
pub use display::{display_report, is_finding};
pub use github::GitHub;
pub use meter::Meter;
pub use query::fetch_pull_requests;
pub use types::{
    Counted, Forge, Pull, PullDetails, PullRef, PullState, QueryResult, QuerySpec, Repo,
    Repository, Review, ReviewComment, ReviewVerdict, SearchItem, Status, StatusState,
};
