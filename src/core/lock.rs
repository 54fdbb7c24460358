use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum LockError {
    #[error("{0} lock is unavailable")]
    Unavailable(&'static str),
}

/// FIFO mutex that can be closed. Once closed, every acquisition fails, including
/// acquisitions already queued when `close` was called.
pub(crate) struct ExclusiveLock<T> {
    name: &'static str,
    closed: AtomicBool,
    value: Mutex<T>,
}

impl<T> ExclusiveLock<T> {
    pub(crate) fn new(name: &'static str, value: T) -> Self {
        Self { name, closed: AtomicBool::new(false), value: Mutex::new(value) }
    }

    pub(crate) async fn acquire(&self) -> Result<MutexGuard<'_, T>, LockError> {
        if self.is_closed() {
            return Err(LockError::Unavailable(self.name));
        }

        let guard = self.value.lock().await;
        if self.is_closed() {
            return Err(LockError::Unavailable(self.name));
        }

        Ok(guard)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::{sleep, Duration};

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let lock = Arc::new(ExclusiveLock::new("counter", 0u64));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let lock = lock.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let mut value = lock.acquire().await.expect("open lock");
                    let read = *value;
                    tokio::task::yield_now().await;
                    *value = read + 1;
                }
            }));
        }

        for handle in handles {
            handle.await.expect("join");
        }

        let lock = Arc::try_unwrap(lock).ok().expect("sole owner");
        assert_eq!(lock.into_inner(), 1600);
    }

    #[tokio::test]
    async fn closed_lock_refuses_acquisition() {
        let lock = ExclusiveLock::new("rubric", ());
        lock.close();
        assert_eq!(lock.acquire().await.err(), Some(LockError::Unavailable("rubric")));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_acquisition_fails_after_close() {
        let lock = Arc::new(ExclusiveLock::new("progress", ()));
        let held = lock.acquire().await.expect("open lock");

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire().await.map(|_| ()) })
        };

        sleep(Duration::from_millis(10)).await;
        lock.close();
        drop(held);

        assert_eq!(waiter.await.expect("join"), Err(LockError::Unavailable("progress")));
    }

    #[test]
    fn error_names_the_lock() {
        assert_eq!(LockError::Unavailable("rubric").to_string(), "rubric lock is unavailable");
    }
}
