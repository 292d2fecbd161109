//! Bounded-parallel batch execution
//!
//! Items are split into fixed-size chunks in input order. Every item of a
//! chunk runs concurrently; the next chunk starts only after the whole
//! chunk has finished.

use futures::future::join_all;
use std::future::Future;

/// Outputs in input order, plus the size of each chunk that ran
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun<T> {
    pub outputs: Vec<T>,
    pub batch_sizes: Vec<usize>,
}

/// Run `task` over `items`, `batch_size` at a time.
///
/// A `batch_size` of zero is treated as one.
pub async fn run_in_batches<I, T, F, Fut>(items: &[I], batch_size: usize, mut task: F) -> BatchRun<T>
where
    F: FnMut(&I) -> Fut,
    Fut: Future<Output = T>,
{
    let batch_size = batch_size.max(1);
    let mut outputs = Vec::with_capacity(items.len());
    let mut batch_sizes = Vec::with_capacity(items.len().div_ceil(batch_size));

    for chunk in items.chunks(batch_size) {
        let results = join_all(chunk.iter().map(&mut task)).await;
        batch_sizes.push(chunk.len());
        outputs.extend(results);
    }

    BatchRun { outputs, batch_sizes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_batch_sizes_cover_every_item() {
        let items: Vec<usize> = (0..25).collect();
        let run = run_in_batches(&items, 10, |&i| async move { i * 2 }).await;

        assert_eq!(run.batch_sizes, vec![10, 10, 5]);
        assert_eq!(run.outputs, items.iter().map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_input_runs_no_batches() {
        let items: Vec<u8> = Vec::new();
        let run = run_in_batches(&items, 10, |&i| async move { i }).await;
        assert!(run.batch_sizes.is_empty());
        assert!(run.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_zero_batch_size_runs_one_at_a_time() {
        let items = [1, 2, 3];
        let run = run_in_batches(&items, 0, |&i| async move { i }).await;
        assert_eq!(run.batch_sizes, vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_batch_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..12).collect();

        run_in_batches(&items, 4, |_| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }
}
