use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::common::error::{CoordinationError, Result};

/// Worker 启动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// 进程模式 (默认)
    ///
    /// - 机制: 重新执行当前可执行文件，子进程通过 stdin/stdout 与 Master 通信。
    /// - 适用场景: 需要真正的 OS 级并行，且单个 Worker 崩溃不能拖垮其他 Worker。
    Process,

    /// 任务模式
    ///
    /// - 机制: 每个 Worker 是同一进程内的一个 tokio 任务，协议与进程模式完全相同。
    /// - 适用场景: 测试、嵌入式部署、handler 以 IO 为主的场景。
    Task,
}

// ==========================================
// 1. 工作池配置 (PoolConfig)
// ==========================================

/// Worker 池与重启策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker 数量
    ///
    /// - 默认值: 系统逻辑核心数 (`num_cpus::get()`)
    pub workers: usize,

    /// Worker 异常退出后是否拉起替补
    ///
    /// - 默认值: true
    /// - 说明: 退出码为 0 (收到流结束) 的 Worker 永远不会被重启。
    pub restart_worker_on_exit: bool,

    /// 全局最大重启次数
    ///
    /// - 默认值: `workers * 5` (平均每个槽位允许重启 5 次，只是一个估算值)
    /// - 超过后不再补位，进程以降低的并行度继续运行，并记录容量耗尽错误。
    pub max_allowed_worker_restarts_count: Option<usize>,

    /// Worker 崩溃时是否回收其持有的 Payload
    ///
    /// - 默认值: false (至多一次)
    /// - 开启后提供至少一次语义：崩溃 Worker 的 Payload 会优先于新数据被重新分配。
    pub reclaim_reserved_payload_on_fail: bool,

    /// 是否监听 SIGINT / SIGTERM 并触发排空
    pub handle_signals: bool,

    /// 会话层对可重试错误的最大重试次数
    pub dispatch_retry_count: u32,

    /// 会话层重试的基础退避 (毫秒)
    pub dispatch_retry_base_ms: u64,

    /// Worker 启动方式
    pub launch: LaunchMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            restart_worker_on_exit: true,
            max_allowed_worker_restarts_count: None,
            reclaim_reserved_payload_on_fail: false,
            handle_signals: true,
            dispatch_retry_count: 5,
            dispatch_retry_base_ms: 50,
            launch: LaunchMode::Process,
        }
    }
}

impl PoolConfig {
    /// 实际生效的最大重启次数
    pub fn max_restarts(&self) -> usize {
        self.max_allowed_worker_restarts_count
            .unwrap_or(self.workers * 5)
    }
}

// ==========================================
// 2. 锁配置 (LockConfig)
// ==========================================

/// 锁类型判别符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Local,
    Distributed,
}

impl FromStr for LockKind {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(LockKind::Local),
            "distributed" => Ok(LockKind::Distributed),
            other => Err(CoordinationError::Config(format!(
                "Unimplemented lock strategy \"{}\"",
                other
            ))),
        }
    }
}

/// 本地锁选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalLockOptions {
    /// 等待锁的最长时间 (毫秒)
    ///
    /// - 默认值: None (无限等待)
    /// - 超时视为持有者已失联，等待方以 `LockAcquireFailed` 失败。
    pub lock_ttl_ms: Option<u64>,

    /// 最大排队数
    ///
    /// - 默认值: 1000
    /// - 超出的等待方立即以 `TooManyPending` 失败。
    pub max_pending: usize,
}

impl Default for LocalLockOptions {
    fn default() -> Self {
        Self {
            lock_ttl_ms: None,
            max_pending: 1000,
        }
    }
}

impl LocalLockOptions {
    pub fn lock_ttl(&self) -> Option<Duration> {
        self.lock_ttl_ms.map(Duration::from_millis)
    }
}

/// 分布式 (quorum) 锁选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedLockOptions {
    /// 锁的持有时长 (毫秒)
    ///
    /// - 默认值: 10,000 ms
    /// - 警告: 必须大于临界区 (含用户 `fetch_next`) 的最坏耗时。锁不会自动续期，
    ///   临界区超时后锁可能被其他 Master 抢走。
    pub lock_ttl_ms: u64,

    /// 时钟漂移系数
    ///
    /// - 默认值: 0.01
    /// - 有效期 = ttl - 抢锁耗时 - (ttl * drift_factor + 2ms)
    pub drift_factor: f64,

    /// 抢锁最大重试次数
    pub retry_count: u32,

    /// 重试间隔 (毫秒)
    pub retry_delay_ms: u64,

    /// 重试时附加的最大随机抖动 (毫秒)
    pub retry_jitter_ms: u64,
}

impl Default for DistributedLockOptions {
    fn default() -> Self {
        Self {
            lock_ttl_ms: 10_000,
            drift_factor: 0.01,
            retry_count: 10,
            retry_delay_ms: 200,
            retry_jitter_ms: 200,
        }
    }
}

/// 锁配置
///
/// 以 `type` 字段区分变体，例如 `{"type": "local", "max_pending": 64}`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockConfig {
    Local(LocalLockOptions),
    Distributed(DistributedLockOptions),
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig::Local(LocalLockOptions::default())
    }
}

impl LockConfig {
    pub fn kind(&self) -> LockKind {
        match self {
            LockConfig::Local(_) => LockKind::Local,
            LockConfig::Distributed(_) => LockKind::Distributed,
        }
    }

    /// 按判别符构造默认选项
    pub fn with_defaults(kind: LockKind) -> Self {
        match kind {
            LockKind::Local => LockConfig::Local(LocalLockOptions::default()),
            LockKind::Distributed => LockConfig::Distributed(DistributedLockOptions::default()),
        }
    }
}

// ==========================================
// 3. 日志配置 (LoggingConfig)
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// EnvFilter 语法，`RUST_LOG` 优先
    pub level: String,
    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json: false,
        }
    }
}

// ==========================================
// 4. 总配置入口 (ParallelWorkerConfig)
// ==========================================

/// 总配置
///
/// 使用分层结构组织配置项。支持 `serde` 序列化，可直接从 JSON 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelWorkerConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// 所有存储 Key 的前缀
    /// 默认: "stride"
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "stride".to_string()
}

impl Default for ParallelWorkerConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            lock: LockConfig::default(),
            logging: LoggingConfig::default(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl ParallelWorkerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 校验逻辑上不成立的组合
    pub fn validate(&self) -> Result<()> {
        if self.pool.workers == 0 {
            return Err(CoordinationError::Config(
                "pool.workers must be at least 1".into(),
            ));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(CoordinationError::Config("key_prefix cannot be empty".into()));
        }
        if let LockConfig::Distributed(opts) = &self.lock {
            if opts.lock_ttl_ms == 0 {
                return Err(CoordinationError::Config("lock_ttl_ms must be positive".into()));
            }
            if !(0.0..1.0).contains(&opts.drift_factor) {
                return Err(CoordinationError::Config(format!(
                    "drift_factor must be in [0, 1), got {}",
                    opts.drift_factor
                )));
            }
        }
        Ok(())
    }
}
