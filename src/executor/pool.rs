//! Bounded pool for blocking trial work
//!
//! Trials block on transport reads, so they run on tokio's blocking threads.
//! A semaphore caps how many of them can be in flight at once.

use crate::error::{AppError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Detected machine resources used to size the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemResources {
    /// Number of logical CPU cores
    pub cpu_cores: usize,
    /// Worker threads for blocking I/O
    pub worker_threads: usize,
}

impl SystemResources {
    /// Detect the core count. Trials are I/O bound, so the pool gets two
    /// workers per core.
    pub fn detect() -> Self {
        let cpu_cores = num_cpus::get().max(1);
        Self {
            cpu_cores,
            worker_threads: cpu_cores * 2,
        }
    }
}

/// Cloneable handle to a bounded set of blocking workers
#[derive(Debug, Clone)]
pub struct WorkerPool {
    limiter: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            limiter: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Pool sized from [`SystemResources::detect`]
    pub fn detect() -> Self {
        Self::new(SystemResources::detect().worker_threads)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Run `job` on a blocking worker once a permit is free and await its
    /// result. The permit is held until the job returns.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| AppError::internal("Worker pool has been shut down"))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| AppError::internal(format!("Trial worker failed: {}", e)))?
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_system_resources_detection() {
        let resources = SystemResources::detect();
        assert!(resources.cpu_cores >= 1);
        assert_eq!(resources.worker_threads, resources.cpu_cores * 2);
    }

    #[test]
    fn test_pool_size_never_zero() {
        assert_eq!(WorkerPool::new(0).size(), 1);
        assert_eq!(WorkerPool::new(4).available_permits(), 4);
    }

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.run(|| Ok(21 * 2)).await.unwrap(), 42);

        let err = pool.run(|| -> Result<()> { Err(AppError::transport("boom")) }).await.unwrap_err();
        assert_eq!(err.category(), "TRANSPORT");
        assert_eq!(pool.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_panicking_job_maps_to_internal() {
        let pool = WorkerPool::new(1);
        let err = pool.run(|| -> Result<()> { panic!("worker blew up") }).await.unwrap_err();
        assert_eq!(err.category(), "INTERNAL");
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let pool = pool.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                pool.run(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            })
        });

        for job in jobs.collect::<Vec<_>>() {
            job.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
