mod local;
mod quorum;

pub use local::LocalLock;
pub use quorum::QuorumLock;

use std::future::Future;
use std::sync::Arc;

use crate::common::config::LockConfig;
use crate::common::error::{CoordinationError, Result};
use crate::persistence::traits::LockBackend;

// ==========================================
// 锁策略 (LockStrategy)
// ==========================================

/// 临界区互斥策略
///
/// 协调器的每一次状态读改写都包在 `lock_and_execute` 里：
/// - `Local`: 单 Master 进程内的 FIFO 互斥锁
/// - `Distributed`: 基于多个独立后端的 quorum 锁，多 Master 共享同一份状态时使用
#[derive(Debug)]
pub enum LockStrategy {
    Local(LocalLock),
    Distributed(QuorumLock),
}

impl LockStrategy {
    /// 按配置构造锁
    ///
    /// - `key`: 锁在后端上的 Key (通常是 `<prefix>:lock`)
    /// - `backends`: 分布式锁的后端实例，本地锁忽略
    pub fn from_config(
        config: &LockConfig,
        key: impl Into<String>,
        backends: Vec<Arc<dyn LockBackend>>,
    ) -> Result<Self> {
        match config {
            LockConfig::Local(opts) => Ok(LockStrategy::Local(LocalLock::new(opts.clone()))),
            LockConfig::Distributed(opts) => {
                if backends.is_empty() {
                    return Err(CoordinationError::Config(
                        "distributed lock requires at least one backend".to_string(),
                    ));
                }
                Ok(LockStrategy::Distributed(QuorumLock::new(
                    key,
                    backends,
                    opts.clone(),
                )))
            }
        }
    }

    /// 持锁执行 `f`，无论成功失败都会释放锁
    ///
    /// 抢锁失败时 `f` 不会被调用。
    pub async fn lock_and_execute<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        match self {
            LockStrategy::Local(lock) => lock.lock_and_execute(f).await,
            LockStrategy::Distributed(lock) => lock.lock_and_execute(f).await,
        }
    }
}
