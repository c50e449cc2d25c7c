use super::scripts::Scripts;
use crate::common::error::{CoordinationError, Result};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use std::sync::Arc;

/// Redis 协调存储
///
/// 包含 Redis 连接池和预编译的 Lua 脚本。
/// 同一个实例既可以当 CoordinationStore，也可以作为 quorum 锁的一个后端。
#[derive(Clone)]
pub struct RedisStore {
    /// Redis 客户端 连接池
    pub(super) pool: Pool,

    /// Lua 脚本库
    pub(super) scripts: Arc<Scripts>,
}

impl RedisStore {
    /// 创建新实例 (不会立即建立连接)
    pub fn new(url: &str, pool_size: usize) -> Result<Self> {
        let mut cfg = Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(pool_size.max(1)));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CoordinationError::Persistence(format!("create redis pool: {}", e)))?;

        Ok(Self {
            pool,
            scripts: Arc::new(Scripts::new()),
        })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("pool", &self.pool.status())
            .finish()
    }
}
