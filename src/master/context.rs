use tokio_util::sync::CancellationToken;

use crate::common::config::PoolConfig;
use crate::master::dispatcher::Dispatcher;
use crate::master::observer::Observers;
use crate::policy::DispatchBackoff;

/// 协调器上下文 (Master Context)
///
/// **职责**:
/// 打包会话任务和监督循环共享的全部资源，避免在函数调用时传递一长串参数。
/// 每个 Master 进程只有一个，以 `Arc` 共享。
pub struct MasterContext {
    /// Worker 池配置
    pub config: PoolConfig,

    // --- 核心组件 (Components) ---
    /// 游标推进的临界区
    pub dispatcher: Dispatcher,

    /// 生命周期钩子
    pub observers: Observers,

    /// 调度失败后的重试策略
    pub backoff: DispatchBackoff,

    // --- 信号与控制 (Signals & Control) ---
    /// 外部关机信号 (SIGINT/SIGTERM 或调用方主动取消)
    pub shutdown: CancellationToken,

    /// 排空标记：一旦取消，不再下发任何新单元
    pub draining: CancellationToken,
}

impl MasterContext {
    pub fn is_draining(&self) -> bool {
        self.draining.is_cancelled()
    }
}
