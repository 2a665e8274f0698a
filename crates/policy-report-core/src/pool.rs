//! Phase-local bounded worker pool.
//!
//! Each fan-out phase builds its own pool: a [`JoinSet`] whose tasks share a
//! [`Semaphore`] of the configured width. The pool is dropped at the phase's
//! join barrier, which also aborts any task still running after a failure.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{PolicyReportError, Result};
use crate::settings::Parallelism;

/// Run `task` for every item with at most `width` tasks in flight.
///
/// Results are returned in completion order. The first failing task aborts
/// the phase and its error is returned.
pub async fn fan_out<I, F, Fut, T>(
    phase: &'static str,
    width: Parallelism,
    items: I,
    task: F,
) -> Result<Vec<T>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width.get()));
    let mut join_set = JoinSet::new();

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let work = task(item);
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| PolicyReportError::TaskJoin(e.to_string()))?;
            work.await
        });
    }

    debug!(phase, tasks = join_set.len(), width = width.get(), "fan-out submitted");

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        let outcome = joined
            .map_err(|e| PolicyReportError::TaskJoin(format!("{phase} task join error: {e}")))?;
        results.push(outcome?);
    }

    Ok(results)
}
