// src/exec/executor.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::subsystems::{ExecutorConfig, ParallelBackend};
use crate::error::Result;
use super::cancel::CancellationToken;
use super::resources::ResourceEstimator;

// Chunk planning constants
const MIN_CHUNK_ITEMS: usize = 100;
const CHUNKS_PER_WORKER: usize = 3;
const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;
const PROGRESS_LOG_EVERY: usize = 10;

/// Callback invoked after each completed chunk with `(done, total)`.
/// Under the pooled backend calls may arrive out of order.
pub type ChunkObserver<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Pooled,
}

/// Runs a pure function over chunks of an input slice, sequentially or on a
/// rayon pool, returning the flattened results in input order either way.
/// Pool construction failures degrade to sequential execution with a logged
/// warning instead of an error.
pub struct Executor {
    config: ExecutorConfig,
    workers: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl Executor {
    pub fn new(config: &ExecutorConfig) -> Self {
        let estimator = ResourceEstimator::new();
        let workers = estimator.recommend_workers(config);

        let pool = match config.backend {
            ParallelBackend::Sequential => None,
            ParallelBackend::Threads if workers <= 1 => None,
            ParallelBackend::Threads => {
                match ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .stack_size(WORKER_STACK_SIZE)
                    .build()
                {
                    Ok(pool) => Some(Arc::new(pool)),
                    Err(e) => {
                        warn!(
                            "Thread pool build failed ({}); falling back to sequential execution",
                            e
                        );
                        None
                    }
                }
            }
        };

        info!(
            "Execution substrate ready: {} workers, backend {}, memory pressure {}",
            workers,
            config.backend.as_str(),
            estimator.pressure()
        );

        Self {
            config: config.clone(),
            workers,
            pool,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Sequential for small inputs, single workers, or a missing pool.
    pub fn mode_for(&self, item_count: usize) -> ExecutionMode {
        if self.pool.is_none()
            || self.workers <= 1
            || item_count < self.config.small_input_threshold
        {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Pooled
        }
    }

    /// Balanced chunk ranges over `n` items: `min(workers*3,
    /// ceil(n/chunk_size))` chunks, no chunk smaller than 100 items once the
    /// input itself exceeds 100.
    pub fn plan_chunks(&self, n: usize) -> Vec<(usize, usize)> {
        if n == 0 {
            return Vec::new();
        }

        let by_size = (n + self.config.chunk_size - 1) / self.config.chunk_size;
        let target = (self.workers * CHUNKS_PER_WORKER).min(by_size).max(1);

        let mut chunk_len = (n + target - 1) / target;
        if n > MIN_CHUNK_ITEMS {
            chunk_len = chunk_len.max(MIN_CHUNK_ITEMS);
        }

        let mut chunks = Vec::with_capacity(n / chunk_len + 1);
        let mut start = 0;
        while start < n {
            let end = (start + chunk_len).min(n);
            chunks.push((start, end));
            start = end;
        }
        chunks
    }

    /// Applies `f` to each chunk and flattens the results in input order.
    /// The cancellation token is polled at chunk boundaries only; a
    /// cancelled run returns the results of the chunks already processed.
    pub fn map_chunks<T, R, F>(
        &self,
        items: &[T],
        token: &CancellationToken,
        f: F,
    ) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> Result<Vec<R>> + Send + Sync,
    {
        self.map_chunks_with(items, token, None, f)
    }

    /// `map_chunks` with an optional per-chunk progress callback.
    pub fn map_chunks_with<T, R, F>(
        &self,
        items: &[T],
        token: &CancellationToken,
        observer: Option<ChunkObserver>,
        f: F,
    ) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> Result<Vec<R>> + Send + Sync,
    {
        match self.mode_for(items.len()) {
            ExecutionMode::Sequential => self.run_sequential(items, token, observer, &f),
            ExecutionMode::Pooled => self.run_pooled(items, token, observer, &f),
        }
    }

    /// Item-level variant of `map_chunks`; one result per item, same
    /// ordering and cancellation contract.
    pub fn map_items<T, R, F>(
        &self,
        items: &[T],
        token: &CancellationToken,
        f: F,
    ) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Send + Sync,
    {
        self.map_chunks(items, token, |chunk| chunk.iter().map(&f).collect())
    }

    fn run_sequential<T, R, F>(
        &self,
        items: &[T],
        token: &CancellationToken,
        observer: Option<ChunkObserver>,
        f: &F,
    ) -> Result<Vec<R>>
    where
        F: Fn(&[T]) -> Result<Vec<R>>,
    {
        let chunks = self.plan_chunks(items.len());
        let mut results = Vec::new();

        for (idx, &(start, end)) in chunks.iter().enumerate() {
            if token.is_cancelled() {
                debug!(
                    "Cancellation observed; stopping after {}/{} chunks",
                    idx,
                    chunks.len()
                );
                break;
            }
            results.extend(f(&items[start..end])?);
            if let Some(observe) = observer {
                observe(idx + 1, chunks.len());
            }
        }

        Ok(results)
    }

    fn run_pooled<T, R, F>(
        &self,
        items: &[T],
        token: &CancellationToken,
        observer: Option<ChunkObserver>,
        f: &F,
    ) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> Result<Vec<R>> + Send + Sync,
    {
        let pool = match &self.pool {
            Some(pool) => Arc::clone(pool),
            None => {
                warn!("Parallel backend unavailable; running sequentially");
                return self.run_sequential(items, token, observer, f);
            }
        };

        let chunks = self.plan_chunks(items.len());
        let total_chunks = chunks.len();
        let progress = AtomicUsize::new(0);

        debug!(
            "Dispatching {} items as {} chunks across {} workers",
            items.len(),
            total_chunks,
            self.workers
        );

        let collected: Result<Vec<Vec<R>>> = pool.install(|| {
            (0..total_chunks)
                .into_par_iter()
                .map(|chunk_idx| -> Result<Vec<R>> {
                    if token.is_cancelled() {
                        return Ok(Vec::new());
                    }

                    let (start, end) = chunks[chunk_idx];
                    let out = f(&items[start..end])?;

                    let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_LOG_EVERY == 0 || done == total_chunks {
                        debug!("Processed {}/{} chunks", done, total_chunks);
                    }
                    if let Some(observe) = observer {
                        observe(done, total_chunks);
                    }
                    Ok(out)
                })
                .collect()
        });

        Ok(collected?.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::subsystems::{ExecutorConfig, ParallelBackend};

    fn executor_with(workers: usize, backend: ParallelBackend, small_input: usize) -> Executor {
        let mut config = ExecutorConfig::default();
        config.worker_count = workers;
        config.backend = backend;
        config.small_input_threshold = small_input;
        Executor::new(&config)
    }

    #[test]
    fn chunk_plan_covers_input_exactly_once() {
        let executor = executor_with(4, ParallelBackend::Threads, 0);
        for n in [0usize, 1, 99, 100, 101, 1000, 12_345] {
            let chunks = executor.plan_chunks(n);
            let mut expected_start = 0;
            for &(start, end) in &chunks {
                assert_eq!(start, expected_start);
                assert!(end > start);
                expected_start = end;
            }
            assert_eq!(expected_start, n);
        }
    }

    #[test]
    fn chunks_respect_minimum_size() {
        let executor = executor_with(8, ParallelBackend::Threads, 0);
        let chunks = executor.plan_chunks(5_000);
        for &(start, end) in &chunks[..chunks.len() - 1] {
            assert!(end - start >= 100);
        }
    }

    #[test]
    fn small_inputs_run_sequentially() {
        let executor = executor_with(4, ParallelBackend::Threads, 10_000);
        assert_eq!(executor.mode_for(9_999), ExecutionMode::Sequential);
    }

    #[test]
    fn sequential_backend_never_pools() {
        let executor = executor_with(4, ParallelBackend::Sequential, 0);
        assert_eq!(executor.mode_for(1_000_000), ExecutionMode::Sequential);
    }

    #[test]
    fn pooled_and_sequential_agree() {
        let items: Vec<u64> = (0..50_000).collect();
        let square_sum = |chunk: &[u64]| -> crate::error::Result<Vec<u64>> {
            Ok(chunk.iter().map(|x| x * x).collect())
        };

        let sequential = executor_with(1, ParallelBackend::Sequential, 0);
        let pooled = executor_with(4, ParallelBackend::Threads, 0);
        let token = CancellationToken::new();

        let a = sequential.map_chunks(&items, &token, square_sum).unwrap();
        let b = pooled.map_chunks(&items, &token, square_sum).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cancelled_token_yields_valid_partial_result() {
        let executor = executor_with(1, ParallelBackend::Sequential, 0);
        let token = CancellationToken::new();
        token.cancel();

        let items: Vec<u64> = (0..1_000).collect();
        let out = executor
            .map_chunks(&items, &token, |chunk| Ok(chunk.to_vec()))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn map_items_matches_map_chunks() {
        let executor = executor_with(2, ParallelBackend::Threads, 0);
        let token = CancellationToken::new();
        let items: Vec<i64> = (0..500).collect();

        let a = executor.map_items(&items, &token, |x| Ok(x + 1)).unwrap();
        let b = executor
            .map_chunks(&items, &token, |chunk| {
                Ok(chunk.iter().map(|x| x + 1).collect())
            })
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sequential_observer_sees_chunks_in_order() {
        let executor = executor_with(1, ParallelBackend::Sequential, 0);
        let token = CancellationToken::new();
        let items: Vec<u32> = (0..3_000).collect();

        let seen = std::sync::Mutex::new(Vec::new());
        let observe = |done: usize, total: usize| {
            seen.lock().unwrap().push((done, total));
        };
        let observer: ChunkObserver = &observe;

        executor
            .map_chunks_with(&items, &token, Some(observer), |chunk| Ok(chunk.to_vec()))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn pooled_observer_counts_every_chunk_once() {
        let executor = executor_with(4, ParallelBackend::Threads, 0);
        let token = CancellationToken::new();
        let items: Vec<u32> = (0..50_000).collect();
        let expected_chunks = executor.plan_chunks(items.len()).len();

        let seen = std::sync::Mutex::new(Vec::new());
        let observe = |done: usize, total: usize| {
            seen.lock().unwrap().push((done, total));
        };
        let observer: ChunkObserver = &observe;

        executor
            .map_chunks_with(&items, &token, Some(observer), |chunk| {
                Ok(vec![chunk.len()])
            })
            .unwrap();

        let calls = seen.lock().unwrap();
        let mut dones: Vec<usize> = calls.iter().map(|&(done, _)| done).collect();
        dones.sort_unstable();
        assert_eq!(dones, (1..=expected_chunks).collect::<Vec<_>>());
        assert!(calls.iter().all(|&(_, total)| total == expected_chunks));
    }
}
