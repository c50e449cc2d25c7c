use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::common::config::LocalLockOptions;
use crate::common::error::{CoordinationError, Result};

/// 进程内互斥锁
///
/// tokio 的 Mutex 本身按 FIFO 唤醒等待者，这里额外限制排队长度和等待时长。
#[derive(Debug)]
pub struct LocalLock {
    mutex: Mutex<()>,
    /// 正在排队 (尚未拿到锁) 的调用方数量
    pending: AtomicUsize,
    options: LocalLockOptions,
}

/// 离开作用域时把排队计数减回去 (包括超时/取消)
struct PendingSlot<'a>(&'a AtomicUsize);

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LocalLock {
    pub fn new(options: LocalLockOptions) -> Self {
        Self {
            mutex: Mutex::new(()),
            pending: AtomicUsize::new(0),
            options,
        }
    }

    /// 当前排队数
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub async fn lock_and_execute<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let max = self.options.max_pending;
        // 先占位再检查，保证并发下也不会超过上限
        if self.pending.fetch_add(1, Ordering::SeqCst) >= max {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(CoordinationError::TooManyPending(max));
        }

        let guard = {
            let _slot = PendingSlot(&self.pending);
            match self.options.lock_ttl() {
                Some(ttl) => tokio::time::timeout(ttl, self.mutex.lock())
                    .await
                    .map_err(|_| {
                        CoordinationError::LockAcquireFailed(format!(
                            "local lock wait exceeded {}ms",
                            ttl.as_millis()
                        ))
                    })?,
                None => self.mutex.lock().await,
            }
        };

        let result = f().await;
        drop(guard);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn lock(max_pending: usize, ttl_ms: Option<u64>) -> Arc<LocalLock> {
        Arc::new(LocalLock::new(LocalLockOptions {
            lock_ttl_ms: ttl_ms,
            max_pending,
        }))
    }

    #[tokio::test]
    async fn sections_never_overlap() {
        let lock = lock(1000, None);
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let lock = lock.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                lock.lock_and_execute(|| async {
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }

        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(lock.pending(), 0);
    }

    #[tokio::test]
    async fn rejects_when_queue_is_full() {
        let lock = lock(1, None);
        let holder = lock.clone();
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let held = tokio::spawn(async move {
            holder
                .lock_and_execute(|| async move {
                    let _ = entered_tx.send(());
                    let _ = release_rx.await;
                    Ok(())
                })
                .await
        });
        entered_rx.await.unwrap();

        // 持有者已经离开排队，再来一个可以排上
        let waiter = lock.clone();
        let queued = tokio::spawn(async move { waiter.lock_and_execute(|| async { Ok(1) }).await });
        while lock.pending() < 1 {
            tokio::task::yield_now().await;
        }

        let err = lock
            .lock_and_execute(|| async { Ok(2) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::TooManyPending(1)));

        release_tx.send(()).unwrap();
        held.await.unwrap().unwrap();
        assert_eq!(queued.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn wait_is_bounded_by_ttl() {
        let lock = lock(10, Some(20));
        let holder = lock.clone();
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();

        let held = tokio::spawn(async move {
            holder
                .lock_and_execute(|| async move {
                    let _ = entered_tx.send(());
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                })
                .await
        });
        entered_rx.await.unwrap();

        let err = lock
            .lock_and_execute(|| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::LockAcquireFailed(_)));
        assert_eq!(lock.pending(), 0);

        held.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn section_error_releases_the_lock() {
        let lock = lock(10, None);
        let err = lock
            .lock_and_execute(|| async {
                Err::<(), _>(CoordinationError::FetchFailed("boom".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::FetchFailed(_)));

        assert_eq!(lock.lock_and_execute(|| async { Ok(7) }).await.unwrap(), 7);
    }
}
