// 1. 基础模块
pub mod common;

// 2. 存储与互斥
pub mod lock;
pub mod persistence;

// 3. 通信协议与策略
pub mod policy;
pub mod protocol;

// 4. 进程模型
pub mod launcher;
pub mod master;
pub mod worker;

// 5. 用户入口
pub mod pool;

pub use common::{
    CoordinationError, Cursor, FetchNext, Id, LaunchMode, LockConfig, ParallelWorkerConfig,
    Payload, PayloadHandler, Result,
};
pub use master::{MetricsObserver, PoolMetrics, PoolObserver, PoolReport, StopReason};
pub use persistence::MemoryStore;
#[cfg(feature = "distributed")]
pub use persistence::RedisStore;
pub use pool::ParallelWorker;
