use std::time::Duration;

use crate::common::config::PoolConfig;
use crate::common::error::CoordinationError;
use crate::common::utils::calculate_backoff;

/// 单次调度失败后的决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 睡一会儿再试
    Retry(Duration),
    /// 放弃，交给上层处理 (会话会终止该 Worker)
    GiveUp,
}

/// 调度重试策略 (指数退避 + Full Jitter)
///
/// - 只有 `is_retryable()` 的错误 (锁竞争、网络抖动) 才会重试。
/// - 第 N 次重试的等待上限为 `base * 2^(N-1)`，最多 `max_delay`。
#[derive(Debug, Clone)]
pub struct DispatchBackoff {
    max_attempts: u32,
    base: Duration,
    max_delay: Duration,
}

impl DispatchBackoff {
    pub fn new(max_attempts: u32, base: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base,
            max_delay,
        }
    }

    pub fn from_config(cfg: &PoolConfig) -> Self {
        Self::new(
            cfg.dispatch_retry_count,
            Duration::from_millis(cfg.dispatch_retry_base_ms),
            Duration::from_secs(5),
        )
    }

    /// `attempt` 是已经失败的次数 (从 1 开始)
    pub fn decide(&self, attempt: u32, err: &CoordinationError) -> RetryDecision {
        if !err.is_retryable() || attempt > self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(calculate_backoff(attempt, self.base, self.max_delay))
    }
}

impl Default for DispatchBackoff {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(50), Duration::from_secs(5))
    }
}
