//! Bounded worker pool.
//!
//! The source implementation spawns a fixed number of OS daemon threads
//! pulling work off a `queue.Queue` and blocks on `q.join()`. AWS SDK calls
//! here are async I/O under tokio rather than blocking calls, so the same
//! fixed-concurrency, block-until-drained contract is implemented as tokio
//! tasks gated by a [`tokio::sync::Semaphore`] instead of OS threads: each
//! unit of work acquires a permit before running and releases it on
//! completion, bounding how many run at once without reintroducing blocking
//! threads into an async binary.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Run `jobs` with at most `concurrency` running at any one time, returning
/// every result once all jobs have completed. Panics in a job are not caught;
/// a job that needs to report failure without poisoning its siblings should
/// return a `Result` and let the caller inspect it.
pub async fn run_bounded<T, F, Fut>(jobs: Vec<T>, concurrency: usize, work: F) -> Vec<Fut::Output>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let work = Arc::new(work);
    let handles = jobs.into_iter().map(|item| {
        let semaphore = Arc::clone(&semaphore);
        let work = Arc::clone(&work);
        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed while jobs are outstanding");
            work(item).await
        })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("worker task panicked"))
        .collect()
}
