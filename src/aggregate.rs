use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    meter::Meter,
    types::{Forge, Pull, SearchItem},
};

/// Builds the full record for one search hit.
///
/// Runs the three dependent lookups in order: pull request details, reviews,
/// then statuses of the head commit. Calls spent are booked on `meter` even
/// when a later step fails.
pub async fn aggregate_pull<F>(forge: &F, item: &SearchItem, meter: &mut Meter) -> Result<Pull>
where
    F: Forge + Sync + ?Sized,
{
    let pull_ref = item.pull_ref()?;

    let pr = meter
        .record(forge.get_pull_request(&pull_ref).await)
        .with_context(|| format!("Failed to fetch pull request {pull_ref}"))?;
    debug!(pull = %pull_ref, state = ?pr.state, mergeable_state = ?pr.mergeable_state, "fetched pull request");

    // Later steps address the pull request through its base repository.
    let pull_ref = pr.pull_ref();

    let reviews = meter
        .record(forge.list_reviews(&pull_ref).await)
        .with_context(|| format!("Failed to list reviews for {pull_ref}"))?;
    debug!(pull = %pull_ref, reviews = reviews.len(), "fetched reviews");

    if pr.statuses_url.is_none() {
        anyhow::bail!("Pull request {pull_ref} exposes no status endpoint");
    }

    let statuses = meter
        .record(forge.list_statuses(&pr.base_repo, &pr.head_sha).await)
        .with_context(|| format!("Failed to list statuses for {pull_ref} at {}", pr.head_sha))?;
    debug!(pull = %pull_ref, statuses = statuses.len(), calls = meter.calls(), "fetched statuses");

    Ok(Pull {
        pr,
        reviews,
        statuses,
        api_calls: meter.calls(),
    })
}
