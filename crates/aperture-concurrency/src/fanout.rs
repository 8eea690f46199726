// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded-concurrency fan-out used by the prober (per-detector probing)
//! and the orchestrator (per-scan detector dispatch).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Runs `f` once per item in `items`, with at most `concurrency` instances
/// running at a time. Results are returned in the same order as `items`
/// regardless of completion order.
///
/// `f` must be `Send + 'static` since each invocation is spawned onto the
/// runtime rather than polled inline — this matches the "parser/predicate
/// code runs to completion, only I/O suspends" split in the concurrency
/// model: callers pass closures that do their own `.await`ing of I/O.
pub async fn fan_out<T, F, Fut, R>(items: Vec<T>, concurrency: usize, f: F) -> Vec<R>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let f = Arc::new(f);
    let mut set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let f = Arc::clone(&f);
        set.spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed");
            let result = f(item).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<R>> = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => {
                if slots.len() <= index {
                    slots.resize_with(index + 1, || None);
                }
                slots[index] = Some(result);
            }
            Err(err) => {
                warn!(target: "aperture.concurrency.fanout", error = %err, "fan-out task panicked");
            }
        }
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn runs_every_item_and_preserves_order() {
        let items = vec![1, 2, 3, 4, 5];
        let results = fan_out(items, 2, |n| async move { n * 10 }).await;
        assert_eq!(results, vec![10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_cap() {
        let inflight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..20).collect();

        let inflight_for_closure = Arc::clone(&inflight);
        let peak_for_closure = Arc::clone(&peak);
        let _ = fan_out(items, 3, move |_| {
            let inflight = Arc::clone(&inflight_for_closure);
            let peak = Arc::clone(&peak_for_closure);
            async move {
                let now = inflight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                inflight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results: Vec<i32> = fan_out(Vec::<i32>::new(), 4, |n| async move { n }).await;
        assert!(results.is_empty());
    }
}
