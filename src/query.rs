use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    aggregate::aggregate_pull,
    meter::Meter,
    types::{Forge, Pull, QueryResult, QuerySpec, SearchItem},
};

enum TaskOutcome {
    Done(Pull),
    Failed(anyhow::Error),
    Cancelled,
}

struct TaskReport {
    calls: usize,
    outcome: TaskOutcome,
}

/// Searches for pull requests and fetches every match concurrently.
///
/// One task per search hit, at most `spec.max_concurrent` of them talking to
/// the forge at a time. The first failure cancels the remaining tasks and is
/// returned with the number of API calls already made; no partial result is
/// ever returned.
pub async fn fetch_pull_requests<F>(spec: &QuerySpec, forge: Arc<F>) -> anyhow::Result<QueryResult>
where
    F: Forge + Send + Sync + 'static,
{
    let search = forge.search_issues(&spec.query).await;
    let search_calls = search.calls;
    let items = search
        .result
        .with_context(|| format!("Failed to search for '{}'", spec.query))?;
    info!(query = %spec.query, found = items.len(), "search complete");

    let (pulls, task_calls) =
        collect_pulls(items, forge.clone(), spec.max_concurrent, spec.task_timeout)
            .await
            .map_err(|(error, task_calls)| {
                error.context(format!(
                    "Aborted after {} API calls to {}",
                    search_calls + task_calls,
                    forge.host()
                ))
            })?;

    Ok(QueryResult {
        pulls,
        api_calls: search_calls + task_calls,
        api_host: forge.host().to_string(),
    })
}

/// Fans out one aggregation task per item and fans the records back in.
///
/// On failure, returns the first error together with every call spent by
/// every task, including the ones cancelled part way.
async fn collect_pulls<F>(
    items: Vec<SearchItem>,
    forge: Arc<F>,
    max_concurrent: usize,
    task_timeout: Duration,
) -> Result<(Vec<Pull>, usize), (anyhow::Error, usize)>
where
    F: Forge + Send + Sync + 'static,
{
    let expected = items.len();
    let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<TaskReport>(expected.max(1));
    let mut tasks = JoinSet::new();

    for item in items {
        let forge = forge.clone();
        let permits = permits.clone();
        let cancel = cancel.clone();
        let tx = tx.clone();

        tasks.spawn(async move {
            let mut meter = Meter::new();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => TaskOutcome::Cancelled,
                outcome = run_task(forge.as_ref(), &item, &permits, task_timeout, &mut meter) => outcome,
            };
            // The receiver only goes away once the collector has given up.
            let _ = tx
                .send(TaskReport {
                    calls: meter.calls(),
                    outcome,
                })
                .await;
        });
    }
    // Only the tasks hold senders now, so the channel closes when the last
    // one finishes.
    drop(tx);

    let mut pulls = Vec::with_capacity(expected);
    let mut calls = 0;
    let mut first_error: Option<anyhow::Error> = None;

    while let Some(report) = rx.recv().await {
        calls += report.calls;
        match report.outcome {
            TaskOutcome::Done(pull) => pulls.push(pull),
            TaskOutcome::Failed(error) => {
                if first_error.is_none() {
                    warn!(error = %format!("{error:#}"), "task failed, cancelling siblings");
                    cancel.cancel();
                    first_error = Some(error);
                }
            }
            TaskOutcome::Cancelled => debug!("task cancelled"),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(join_error) = joined
            && first_error.is_none()
        {
            first_error = Some(anyhow!("Aggregation task did not complete: {join_error}"));
        }
    }

    if let Some(error) = first_error {
        return Err((error, calls));
    }

    // Each task sends exactly one report.
    if pulls.len() != expected {
        return Err((
            anyhow!("Collected {} of {} pull requests", pulls.len(), expected),
            calls,
        ));
    }

    debug!(pulls = pulls.len(), calls, "collected all pull requests");
    Ok((pulls, calls))
}

async fn run_task<F>(
    forge: &F,
    item: &SearchItem,
    permits: &Semaphore,
    task_timeout: Duration,
    meter: &mut Meter,
) -> TaskOutcome
where
    F: Forge + Sync,
{
    let _permit = match permits.acquire().await {
        Ok(permit) => permit,
        Err(_) => return TaskOutcome::Cancelled,
    };

    match tokio::time::timeout(task_timeout, aggregate_pull(forge, item, meter)).await {
        Ok(Ok(pull)) => TaskOutcome::Done(pull),
        Ok(Err(error)) => {
            TaskOutcome::Failed(error.context(format!("Failed to process {}", item.html_url)))
        }
        Err(_) => TaskOutcome::Failed(anyhow!(
            "Timed out after {task_timeout:?} processing {}",
            item.html_url
        )),
    }
}
