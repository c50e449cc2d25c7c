use thiserror::Error;

/// 协调器统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, CoordinationError>;

#[derive(Error, Debug)]
pub enum CoordinationError {
    // ==========================================
    // 1. 配置与启动错误 (Configuration & Startup)
    // ==========================================
    /// 配置错误
    ///
    /// - 触发场景: `start()` 时缺少 `fetch_next` / `handler` 回调，或锁类型无法识别。
    /// - 后果: 启动失败，任何 Worker 进程都不会被拉起。
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker 启动失败
    ///
    /// - 触发场景: 可执行文件不存在、fork 失败、拿不到 PID。
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    /// 协调器正在排空
    ///
    /// - 触发场景: 已收到终止信号，之后到达的 `getNextPayload` 请求一律拒绝。
    #[error("Coordinator is draining, refusing new dispatch.")]
    Draining,

    // ==========================================
    // 2. 锁错误 (Locking)
    // ==========================================
    /// 抢锁失败
    ///
    /// - 触发场景: 分布式锁重试次数耗尽，或本地锁等待超过 `lock_ttl`。
    /// - 处理: 属于暂时性竞争，由调用方退避重试。
    #[error("Failed to acquire lock {0} (contention or timeout).")]
    LockAcquireFailed(String),

    /// 本地锁等待队列已满
    ///
    /// - 触发场景: 排队等待本地锁的调用方数量达到 `max_pending`。
    /// - 后果: 快速失败，避免在争用风暴下无限堆积内存。
    #[error("Too many pending lock waiters (limit: {0}).")]
    TooManyPending(usize),

    // ==========================================
    // 3. 调度错误 (Dispatch)
    // ==========================================
    /// 游标未按预期推进
    ///
    /// - 触发场景: `fetch_next` 返回了非空 Payload，但没有携带终止 ID。
    /// - 后果: 本轮调度失败，以 error 级别记录。
    #[error("Failed to get next payload: {0}")]
    FetchFailed(String),

    /// 用户 `fetch_next` 回调返回错误
    #[error("User fetch function failed: {0}")]
    UserFetch(#[source] anyhow::Error),

    /// 用户 `handler` 回调返回错误
    ///
    /// - 后果: 对 Worker 来说是致命的，进程以退出码 1 结束。
    #[error("User handler failed: {0}")]
    UserHandler(#[source] anyhow::Error),

    // ==========================================
    // 4. 通信错误 (Wire)
    // ==========================================
    /// 内部通信通道已关闭
    #[error("Internal communication channel closed.")]
    ChannelClosed,

    /// 报文格式错误
    #[error("Protocol violation: {0}")]
    Protocol(String),

    // ==========================================
    // 5. 基础设施与 IO 错误 (Infrastructure & IO)
    // ==========================================
    /// Redis 交互失败
    #[cfg(feature = "distributed")]
    #[error("Redis interaction failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// Redis 连接池错误
    #[cfg(feature = "distributed")]
    #[error("Redis pool failed: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// 序列化/反序列化失败
    ///
    /// - 触发场景: 存储里的游标或分配记录 JSON 损坏。
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 通用 IO 错误
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// 持久化层通用错误
    #[error("Persistence layer failure: {0}")]
    Persistence(String),
}

impl CoordinationError {
    /// 判断该错误是否值得重试
    ///
    /// - `true`: 锁竞争、网络抖动等暂时性故障，会话层会退避后重新发起调度。
    /// - `false`: 配置错误、不变量被破坏、用户回调失败。重试也没用。
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "distributed")]
            CoordinationError::Redis(e) => {
                e.is_connection_dropped() || e.is_cluster_error() || e.is_io_error()
            }
            #[cfg(feature = "distributed")]
            CoordinationError::Pool(_) => true,

            CoordinationError::Io(_) => true,
            CoordinationError::LockAcquireFailed(_) => true,
            CoordinationError::TooManyPending(_) => true,

            CoordinationError::Config(_) => false,
            CoordinationError::SpawnFailed(_) => false,
            CoordinationError::Draining => false,
            CoordinationError::FetchFailed(_) => false,
            CoordinationError::UserFetch(_) => false,
            CoordinationError::UserHandler(_) => false,
            CoordinationError::ChannelClosed => false,
            CoordinationError::Protocol(_) => false,
            CoordinationError::Serialization(_) => false,
            CoordinationError::Persistence(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_is_retryable() {
        assert!(CoordinationError::LockAcquireFailed("stride:lock".into()).is_retryable());
        assert!(CoordinationError::TooManyPending(8).is_retryable());
    }

    #[test]
    fn invariant_violations_are_not_retryable() {
        assert!(!CoordinationError::FetchFailed("cursor unchanged".into()).is_retryable());
        assert!(!CoordinationError::Config("missing handler".into()).is_retryable());
        assert!(!CoordinationError::UserFetch(anyhow::anyhow!("db down")).is_retryable());
    }
}
