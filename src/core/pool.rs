// src/core/pool.rs

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

/// Runs `handler` over `items` on a fixed pool of `workers` tasks.
///
/// Items are fed through a bounded queue of `queue_capacity`; the workers
/// share its receiver and send every outcome over one result channel to the
/// caller (fan-in), so no result collection is shared between workers.
///
/// Each item yields exactly one outcome. A handler that panics produces
/// `Err(message)` for that item only and its worker keeps draining the queue.
/// Outcomes are returned in completion order.
pub async fn run_pool<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    queue_capacity: usize,
    handler: F,
) -> Vec<Result<R, String>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, total);

    let (job_tx, job_rx) = mpsc::channel::<T>(queue_capacity.max(1));
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<Result<R, String>>(workers * 2);
    let handler = Arc::new(handler);

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let handler = Arc::clone(&handler);
        handles.push(tokio::spawn(async move {
            loop {
                let job = job_rx.lock().await.recv().await;
                let Some(job) = job else { break };
                let outcome = AssertUnwindSafe(async { handler(job).await })
                    .catch_unwind()
                    .await
                    .map_err(|panic| {
                        let message = panic_message(panic);
                        error!(worker_id, panic = %message, "Task panicked; worker continues.");
                        message
                    });
                if result_tx.send(outcome).await.is_err() {
                    break;
                }
            }
            debug!(worker_id, "Worker drained.");
        }));
    }
    drop(result_tx);

    let producer = tokio::spawn(async move {
        for item in items {
            if job_tx.send(item).await.is_err() {
                break;
            }
        }
    });

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = result_rx.recv().await {
        outcomes.push(outcome);
    }

    let _ = producer.await;
    for handle in handles {
        let _ = handle.await;
    }
    outcomes
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn every_item_completes_once() {
        let mut out: Vec<u32> = run_pool((0..100).collect(), 8, 16, |n: u32| async move { n * 2 })
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        out.sort_unstable();
        assert_eq!(out, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_input_does_nothing() {
        let out = run_pool(Vec::<u8>::new(), 4, 4, |n: u8| async move { n }).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_does_not_starve_its_worker() {
        let out = run_pool(vec![1, 2, 3, 4], 1, 1, |n: u32| async move {
            if n == 2 {
                panic!("boom on {n}");
            }
            n
        })
        .await;
        assert_eq!(out.len(), 4);
        let failures: Vec<&String> = out.iter().filter_map(|o| o.as_ref().err()).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("boom on 2"));
        assert_eq!(out.iter().filter(|o| o.is_ok()).count(), 3);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        run_pool((0..40).collect::<Vec<u32>>(), 4, 8, move |_| {
            let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }
}
