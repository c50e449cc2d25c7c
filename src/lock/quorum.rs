use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::common::config::DistributedLockOptions;
use crate::common::error::{CoordinationError, Result};
use crate::common::utils::{new_lock_token, with_jitter};
use crate::persistence::traits::LockBackend;

/// Quorum 分布式锁
///
/// 在 N 个相互独立的后端上用同一个随机 token 抢锁：
/// 1. 并发向所有后端发 `SET NX PX`
/// 2. 成功数达到 `N/2 + 1` 且剩余有效期为正才算持有
/// 3. 否则立即在所有后端上释放，等待 `delay + jitter` 后重试
///
/// 不做自动续期。临界区超过有效期只记一条 warn。
pub struct QuorumLock {
    key: String,
    backends: Vec<Arc<dyn LockBackend>>,
    options: DistributedLockOptions,
}

/// 一次成功的持锁
#[derive(Debug)]
struct Held {
    token: String,
    acquired_at: Instant,
    validity: Duration,
}

impl QuorumLock {
    pub fn new(
        key: impl Into<String>,
        backends: Vec<Arc<dyn LockBackend>>,
        options: DistributedLockOptions,
    ) -> Self {
        Self {
            key: key.into(),
            backends,
            options,
        }
    }

    /// 最少需要多少个后端同意
    pub fn quorum(&self) -> usize {
        self.backends.len() / 2 + 1
    }

    pub async fn lock_and_execute<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let held = self.acquire().await?;

        let result = f().await;

        let used = held.acquired_at.elapsed();
        if used > held.validity {
            warn!(
                "[QuorumLock] Critical section on {} took {}ms, longer than lock validity {}ms",
                self.key,
                used.as_millis(),
                held.validity.as_millis()
            );
        }

        self.release_all(&held.token).await;
        result
    }

    async fn acquire(&self) -> Result<Held> {
        let ttl = Duration::from_millis(self.options.lock_ttl_ms);
        let drift = ttl.mul_f64(self.options.drift_factor) + Duration::from_millis(2);
        let delay = Duration::from_millis(self.options.retry_delay_ms);
        let jitter = Duration::from_millis(self.options.retry_jitter_ms);
        let quorum = self.quorum();

        for attempt in 0..=self.options.retry_count {
            let token = new_lock_token();
            let started = Instant::now();

            let votes = join_all(
                self.backends
                    .iter()
                    .map(|b| b.try_acquire(&self.key, &token, ttl)),
            )
            .await;

            let granted = votes
                .iter()
                .filter(|v| match v {
                    Ok(ok) => *ok,
                    Err(e) => {
                        debug!("[QuorumLock] Backend error while acquiring {}: {}", self.key, e);
                        false
                    }
                })
                .count();

            let elapsed = started.elapsed();
            let validity = ttl.checked_sub(elapsed + drift);

            match validity {
                Some(validity) if granted >= quorum && !validity.is_zero() => {
                    return Ok(Held {
                        token,
                        acquired_at: started,
                        validity,
                    });
                }
                _ => {
                    debug!(
                        "[QuorumLock] Attempt {} on {} got {}/{} votes",
                        attempt + 1,
                        self.key,
                        granted,
                        self.backends.len()
                    );
                    // 部分成功的实例也要清理掉
                    self.release_all(&token).await;
                }
            }

            if attempt < self.options.retry_count {
                tokio::time::sleep(with_jitter(delay, jitter)).await;
            }
        }

        Err(CoordinationError::LockAcquireFailed(self.key.clone()))
    }

    /// 在所有后端上释放 (只删除值等于 token 的 Key)
    async fn release_all(&self, token: &str) {
        let results = join_all(self.backends.iter().map(|b| b.release(&self.key, token))).await;
        for r in results {
            if let Err(e) = r {
                warn!("[QuorumLock] Failed to release {}: {}", self.key, e);
            }
        }
    }
}

impl std::fmt::Debug for QuorumLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumLock")
            .field("key", &self.key)
            .field("backends", &self.backends.len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 永远不可用的后端
    struct DownBackend;

    #[async_trait]
    impl LockBackend for DownBackend {
        async fn try_acquire(&self, _: &str, _: &str, _: Duration) -> Result<bool> {
            Err(CoordinationError::Persistence("connection refused".into()))
        }

        async fn release(&self, _: &str, _: &str) -> Result<bool> {
            Err(CoordinationError::Persistence("connection refused".into()))
        }
    }

    fn fast_options(retry_count: u32) -> DistributedLockOptions {
        DistributedLockOptions {
            lock_ttl_ms: 5_000,
            drift_factor: 0.01,
            retry_count,
            retry_delay_ms: 5,
            retry_jitter_ms: 5,
        }
    }

    fn memory_backends(n: usize) -> (Vec<MemoryStore>, Vec<Arc<dyn LockBackend>>) {
        let stores: Vec<MemoryStore> = (0..n).map(|_| MemoryStore::new()).collect();
        let backends = stores
            .iter()
            .map(|s| Arc::new(s.clone()) as Arc<dyn LockBackend>)
            .collect();
        (stores, backends)
    }

    #[tokio::test]
    async fn majority_is_enough_and_lock_is_released() {
        let (stores, mut backends) = memory_backends(2);
        backends.push(Arc::new(DownBackend));
        let lock = QuorumLock::new("p:lock", backends, fast_options(0));
        assert_eq!(lock.quorum(), 2);

        let value = lock
            .lock_and_execute(|| async {
                assert!(stores[0].lock_holder("p:lock").is_some());
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert!(stores.iter().all(|s| s.lock_holder("p:lock").is_none()));
    }

    #[tokio::test]
    async fn minority_fails_without_running_the_section() {
        let (stores, mut backends) = memory_backends(1);
        backends.push(Arc::new(DownBackend));
        backends.push(Arc::new(DownBackend));
        let lock = QuorumLock::new("p:lock", backends, fast_options(2));

        let calls = AtomicUsize::new(0);
        let err = lock
            .lock_and_execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinationError::LockAcquireFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // 部分成功的那个实例已被清理
        assert!(stores[0].lock_holder("p:lock").is_none());
    }

    #[tokio::test]
    async fn contenders_are_serialized() {
        let (_stores, backends) = memory_backends(3);
        let lock = Arc::new(QuorumLock::new("p:lock", backends, fast_options(200)));
        let inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = lock.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                lock.lock_and_execute(|| async {
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(3)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
    }
}
