//! Worker pool: bounded-concurrency admission for runs (§4.4).
//!
//! "A bounded channel used as semaphore", literally: the channel is
//! pre-filled with `capacity` unit permits; acquiring one blocks until a
//! permit is available (or the caller's cancellation fires), and dropping
//! the returned [`Permit`] returns it to the channel.

use crate::error::EngineError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A held admission slot. Returns itself to the pool on drop.
pub struct Permit {
    tx: mpsc::Sender<()>,
    active: Arc<AtomicUsize>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        // Buffer always has room: one permit left the channel for every
        // Permit in flight, so returning it can never exceed capacity.
        let _ = self.tx.try_send(());
    }
}

/// Bounded admission gate for concurrently running closures.
pub struct WorkerPool {
    capacity: usize,
    tx: mpsc::Sender<()>,
    rx: AsyncMutex<mpsc::Receiver<()>>,
    active: Arc<AtomicUsize>,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Creates a pool with the given capacity (clamped to at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        for _ in 0..capacity {
            tx.try_send(())
                .expect("freshly created channel has room for its own capacity");
        }
        Self {
            capacity,
            tx,
            rx: AsyncMutex::new(rx),
            active: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
        }
    }

    /// Configured maximum concurrently admitted closures.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently admitted closures.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// `capacity - active_count`.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.capacity.saturating_sub(self.active_count())
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, EngineError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EngineError::Cancelled),
            permit = rx.recv() => {
                permit.ok_or_else(|| EngineError::ExecutorError("worker pool closed".into()))?;
                self.active.fetch_add(1, Ordering::SeqCst);
                Ok(Permit { tx: self.tx.clone(), active: Arc::clone(&self.active) })
            }
        }
    }

    /// Asynchronous submission: acquires a slot, then runs `task` on a
    /// background task. Errors from `task` are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] if `cancel` fires before a slot
    /// is available.
    pub async fn submit_async<F>(&self, cancel: CancellationToken, task: F) -> Result<(), EngineError>
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let permit = self.acquire(&cancel).await?;
        self.tracker.spawn(async move {
            let _permit = permit;
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "asynchronous worker-pool task failed");
            }
        });
        Ok(())
    }

    /// Synchronous submission: acquires a slot, then runs `task` inline,
    /// returning its result verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] if `cancel` fires before a slot
    /// is available, otherwise whatever `task` returns.
    pub async fn submit_sync<F, T>(&self, cancel: &CancellationToken, task: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let permit = self.acquire(cancel).await?;
        let result = task.await;
        drop(permit);
        result
    }

    /// Closes the pool to further background tasks and waits for every
    /// outstanding asynchronous task to finish.
    pub async fn wait_for_drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn peak_concurrency_never_exceeds_capacity() {
        let pool = Arc::new(WorkerPool::new(2));
        let peak = Arc::new(Counter::new(0));
        let current = Arc::new(Counter::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = Arc::clone(&pool);
            let peak = Arc::clone(&peak);
            let current = Arc::clone(&current);
            handles.push(tokio::spawn(async move {
                pool.submit_async(CancellationToken::new(), async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        pool.wait_for_drain().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancellation_aborts_acquire() {
        let pool = WorkerPool::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pool
            .submit_sync(&cancel, async { Ok::<(), EngineError>(()) })
            .await;
        assert_eq!(result, Err(EngineError::Cancelled));
    }

    #[tokio::test]
    async fn synchronous_submission_returns_error_verbatim() {
        let pool = WorkerPool::new(1);
        let cancel = CancellationToken::new();
        let result: Result<(), EngineError> = pool
            .submit_sync(&cancel, async { Err(EngineError::Timeout) })
            .await;
        assert_eq!(result, Err(EngineError::Timeout));
    }

    #[tokio::test]
    async fn permit_is_returned_after_drop() {
        let pool = WorkerPool::new(1);
        let cancel = CancellationToken::new();
        pool.submit_sync(&cancel, async { Ok::<(), EngineError>(()) })
            .await
            .unwrap();
        assert_eq!(pool.available_slots(), 1);
    }
}
