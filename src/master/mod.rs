mod context;
mod coordinator;
mod dispatcher;
mod metrics;
mod observer;
mod session;
mod signal;

pub use context::MasterContext;
pub use coordinator::Coordinator;
pub use dispatcher::Dispatcher;
pub use metrics::{MetricsObserver, PoolMetrics};
pub use observer::{Observers, PoolObserver};

use serde::Serialize;

/// 协调器停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 所有 Worker 都已退出 (流结束，或重启预算耗尽)
    Drained,
    /// 收到关机信号后排空
    Signal,
}

/// 协调器运行报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    pub stop_reason: StopReason,
    /// 累计启动的 Worker 数 (含重启)
    pub workers_started: usize,
    pub workers_restarted: usize,
    pub restart_limit_reached: bool,
}
