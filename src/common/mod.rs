pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod time;
pub mod traits;
pub(crate) mod utils;

// 导出配置
pub use config::{
    DistributedLockOptions, LaunchMode, LocalLockOptions, LockConfig, LockKind, LoggingConfig,
    ParallelWorkerConfig, PoolConfig,
};

// 导出错误类型
pub use error::{CoordinationError, Result};

// 导出核心模型
pub use model::{AssignmentRecord, Cursor, Id, Payload};

// 导出用户需实现的 Trait
pub use traits::{FetchNext, PayloadHandler};

pub use logging::init_logging;
pub use time::TimeUtils;
