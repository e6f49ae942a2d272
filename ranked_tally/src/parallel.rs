//! Fan-out helpers for the analytics that split their work across threads.
//!
//! Work is cut into contiguous chunks, one per worker, and every chunk is handled on its
//! own scoped thread. Results come back in chunk order so that callers can merge them.

use std::num::NonZeroUsize;
use std::thread;

use log::debug;

/// The number of workers to use: the available hardware parallelism.
pub fn worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Runs `f` over at most `workers` contiguous chunks of `items`.
pub fn map_chunks<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&[T]) -> R + Sync,
{
    if items.is_empty() {
        return vec![];
    }
    let workers = workers.clamp(1, items.len());
    if workers == 1 {
        return vec![f(items)];
    }
    let chunk_size = (items.len() + workers - 1) / workers;
    debug!(
        "map_chunks: {} items in chunks of {} over {} workers",
        items.len(),
        chunk_size,
        workers
    );
    let f = &f;
    thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move || f(chunk)))
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(r) => r,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
