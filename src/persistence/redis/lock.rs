use async_trait::async_trait;
use std::time::Duration;

use super::core::RedisStore;
use crate::common::error::Result;
use crate::persistence::traits::LockBackend;
use deadpool_redis::redis;

#[async_trait]
impl LockBackend for RedisStore {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        // SET key token NX PX ttl: 成功返回 "OK"，已被占用返回 nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let deleted: i64 = self
            .scripts
            .release
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;

        Ok(deleted == 1)
    }
}
