//! Ordered fan-out/fan-in over a fixed list of tasks.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError<E> {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(E),
}

/// Run `f` over every item concurrently and wait for all of them.
///
/// Each call is bounded by `per_item`; an elapsed call becomes [`TaskError::Timeout`]. Results
/// come back in input order regardless of completion order.
pub async fn fan_out<I, T, E, F, Fut>(
    items: I,
    per_item: Duration,
    f: F,
) -> Vec<Result<T, TaskError<E>>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let tasks = items.into_iter().map(|item| {
        let fut = f(item);
        async move {
            match tokio::time::timeout(per_item, fut).await {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(TaskError::Failed(e)),
                Err(_) => Err(TaskError::Timeout(per_item)),
            }
        }
    });
    join_all(tasks).await
}
