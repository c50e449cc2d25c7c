use super::MemoryStore;
use super::core::Lease;
use crate::common::error::Result;
use crate::persistence::traits::LockBackend;
use async_trait::async_trait;
use std::time::{Duration, Instant};

#[async_trait]
impl LockBackend for MemoryStore {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock();

        // NX: 只有无人持有 (或租约已过期) 时才能写入
        if leases.get(key).is_some_and(|l| l.is_live(now)) {
            return Ok(false);
        }

        leases.insert(
            key.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool> {
        let mut leases = self.leases.lock();
        match leases.get(key) {
            Some(lease) if lease.token == token => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_is_exclusive_until_release() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(10);

        assert!(store.try_acquire("lock", "a", ttl).await.unwrap());
        assert!(!store.try_acquire("lock", "b", ttl).await.unwrap());

        // 别人的 token 不能释放
        assert!(!store.release("lock", "b").await.unwrap());
        assert_eq!(store.lock_holder("lock").as_deref(), Some("a"));

        assert!(store.release("lock", "a").await.unwrap());
        assert!(store.try_acquire("lock", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let store = MemoryStore::new();
        assert!(
            store
                .try_acquire("lock", "a", Duration::from_millis(1))
                .await
                .unwrap()
        );
        std::thread::sleep(Duration::from_millis(5));

        assert!(
            store
                .try_acquire("lock", "b", Duration::from_secs(1))
                .await
                .unwrap()
        );
        // 过期的持有者释放失败，不会误删新锁
        assert!(!store.release("lock", "a").await.unwrap());
        assert_eq!(store.lock_holder("lock").as_deref(), Some("b"));
    }
}
