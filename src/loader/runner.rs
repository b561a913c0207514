//! Bounded-concurrency task runner.
//!
//! Runs a list of async jobs on a `LocalExecutor` with at most `concurrency` of them
//! in flight. A slot is refilled the moment its job settles, so a slow job never
//! holds back the start of a newer one. Results come back in submission order.
//!
//! On the first failure the runner stops starting new jobs and returns the error.
//! Jobs that are already running are detached rather than cancelled: they run to
//! completion on the executor and their results are discarded.

use smol::{LocalExecutor, Task};
use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

/// One occupied slot: submission index plus the spawned job.
type Slot<T, E> = Option<(usize, Task<Result<T, E>>)>;

pub async fn run_bounded<'ex, T, E, F, Fut>(
    executor: &LocalExecutor<'ex>,
    tasks: Vec<F>,
    concurrency: usize,
) -> Result<Vec<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + 'ex,
    T: 'ex,
    E: 'ex,
{
    let count = tasks.len();
    if count == 0 {
        return Ok(Vec::new());
    }
    let limit = concurrency.clamp(1, count);

    let mut pending = tasks.into_iter().enumerate();
    let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
    let mut slots: Vec<Slot<T, E>> = Vec::with_capacity(limit);
    for (index, job) in pending.by_ref().take(limit) {
        slots.push(Some((index, executor.spawn(job()))));
    }

    log::trace!("run_bounded: {} jobs, {} slots", count, limit);

    while slots.iter().any(Option::is_some) {
        let (slot_idx, index, outcome) = smol::future::poll_fn(|cx| {
            for (slot_idx, slot) in slots.iter_mut().enumerate() {
                if let Some((index, task)) = slot {
                    if let Poll::Ready(outcome) = Pin::new(task).poll(cx) {
                        let index = *index;
                        *slot = None;
                        return Poll::Ready((slot_idx, index, outcome));
                    }
                }
            }
            Poll::Pending
        })
        .await;

        match outcome {
            Ok(value) => {
                results[index] = Some(value);
                if let Some((next_index, job)) = pending.next() {
                    slots[slot_idx] = Some((next_index, executor.spawn(job())));
                }
            }
            Err(err) => {
                for (_, task) in slots.iter_mut().filter_map(Option::take) {
                    task.detach();
                }
                return Err(err);
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}
