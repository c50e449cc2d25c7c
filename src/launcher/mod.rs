mod process;
mod task;

pub use process::{ProcessLauncher, WORKER_SLOT_ENV};
pub use task::TaskLauncher;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::error::Result;

// ==========================================
// 1. 退出状态 (WorkerExit)
// ==========================================

/// Worker 退出状态
///
/// - `code == Some(0)` 是唯一的正常退出 (收到流结束)。
/// - 被信号杀死时 `code` 为 `None`，`signal` 为信号编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl WorkerExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for WorkerExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

// ==========================================
// 2. 启动器接口 (WorkerLauncher)
// ==========================================

/// 已启动的 Worker 进程句柄
#[async_trait]
pub trait WorkerProcess: Send + 'static {
    /// 等待退出 (可重复调用，退出后返回同一结果)
    async fn wait(&mut self) -> Result<WorkerExit>;

    /// 发出终止请求，不等待
    fn start_kill(&mut self) -> Result<()>;
}

/// 一个刚启动的 Worker
///
/// `reader` 读取 Worker 发来的报文，`writer` 向 Worker 发送报文。
pub struct LaunchedWorker {
    pub pid: u32,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub process: Box<dyn WorkerProcess>,
}

impl std::fmt::Debug for LaunchedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedWorker")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Worker 启动器
///
/// 负责创建 Worker 并交出双向消息通道：
/// - `ProcessLauncher`: 重新执行当前可执行文件，走 stdin/stdout
/// - `TaskLauncher`: 同进程 tokio 任务，走内存管道
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    /// 为第 `slot` 个槽位启动一个 Worker
    async fn launch(&self, slot: usize) -> Result<LaunchedWorker>;
}
