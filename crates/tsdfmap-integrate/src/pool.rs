//! A fixed-size worker pool used by the merged and fast integrator
//! strategies to parallelize ray integration across blocks that are
//! protected by `Layer`'s own striped locks.
//!
//! Each call to [`WorkerPool::map`] fans a batch of jobs out across at most
//! `size` scoped worker threads and blocks until they all complete. Using
//! `std::thread::scope` rather than a long-lived channel-fed pool lets the
//! jobs borrow the caller's `Layer` and packet data directly instead of
//! requiring `'static` ownership or reference counting.

/// A bound on how many worker threads a single `map` call may use at once.
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// `size` is clamped to at least 1.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `jobs` across up to `self.size` worker threads and return their
    /// results in the same order `jobs` was given.
    pub fn map<T, F>(&self, jobs: Vec<F>) -> Vec<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        let n = jobs.len();
        if n == 0 {
            return Vec::new();
        }
        let workers = self.size.min(n);
        let chunk_size = n.div_ceil(workers);

        let mut results: Vec<Option<T>> = (0..n).map(|_| None).collect();
        let mut remaining: Vec<(usize, F)> = jobs.into_iter().enumerate().collect();

        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            while !remaining.is_empty() {
                let take = chunk_size.min(remaining.len());
                let chunk: Vec<(usize, F)> = remaining.drain(0..take).collect();
                handles.push(scope.spawn(move || {
                    chunk
                        .into_iter()
                        .map(|(index, job)| (index, job()))
                        .collect::<Vec<_>>()
                }));
            }
            for handle in handles {
                for (index, value) in handle.join().expect("integrator worker thread panicked") {
                    results[index] = Some(value);
                }
            }
        });

        results
            .into_iter()
            .map(|v| v.expect("job dropped before completing"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn map_runs_every_job_and_preserves_order() {
        let pool = WorkerPool::new(4);
        let jobs: Vec<_> = (0..50).map(|i| move || i * i).collect();
        let results = pool.map(jobs);
        let expected: Vec<i32> = (0..50).map(|i| i * i).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn pool_can_borrow_caller_local_data() {
        let pool = WorkerPool::new(8);
        let counter = AtomicUsize::new(0);
        let jobs: Vec<_> = (0..100)
            .map(|_| || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .collect();
        pool.map(jobs);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn empty_job_list_returns_empty_results() {
        let pool = WorkerPool::new(4);
        let jobs: Vec<Box<dyn FnOnce() -> i32 + Send>> = Vec::new();
        assert!(pool.map(jobs).is_empty());
    }
}
