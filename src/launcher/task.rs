use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span};

use super::{LaunchedWorker, WorkerExit, WorkerLauncher, WorkerProcess};
use crate::common::error::Result;
use crate::common::traits::PayloadHandler;
use crate::worker::WorkerRuntime;

/// 内存管道缓冲区大小
const PIPE_CAPACITY: usize = 64 * 1024;

/// 被中止的任务按 SIGKILL 上报
const ABORT_SIGNAL: i32 = 9;

/// 任务启动器
///
/// 每个 Worker 是当前运行时里的一个 tokio 任务，用 `tokio::io::duplex` 代替管道。
/// 协议和退出语义与进程模式一致：
/// - runtime 正常结束 -> 退出码 0
/// - runtime 报错或 panic -> 退出码 1
/// - 被 `start_kill` 中止 -> 信号 9
pub struct TaskLauncher {
    handler: Arc<dyn PayloadHandler>,
    next_pid: AtomicU32,
}

impl TaskLauncher {
    pub fn new(handler: Arc<dyn PayloadHandler>) -> Self {
        Self {
            handler,
            next_pid: AtomicU32::new(1),
        }
    }
}

#[async_trait]
impl WorkerLauncher for TaskLauncher {
    async fn launch(&self, slot: usize) -> Result<LaunchedWorker> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (master_io, worker_io) = tokio::io::duplex(PIPE_CAPACITY);
        let (reader, writer) = tokio::io::split(master_io);

        let mut runtime = WorkerRuntime::new(pid, self.handler.clone());
        let handle = tokio::spawn(
            async move {
                let (wr, ww) = tokio::io::split(worker_io);
                runtime.run(wr, ww).await
            }
            .instrument(info_span!("worker", pid)),
        );

        debug!("[Launcher] Spawned worker task {} for slot {}", pid, slot);

        Ok(LaunchedWorker {
            pid,
            reader: Box::new(reader),
            writer: Box::new(writer),
            process: Box::new(TaskProcess {
                pid,
                handle,
                exit: None,
            }),
        })
    }
}

struct TaskProcess {
    pid: u32,
    handle: JoinHandle<Result<()>>,
    exit: Option<WorkerExit>,
}

#[async_trait]
impl WorkerProcess for TaskProcess {
    async fn wait(&mut self) -> Result<WorkerExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }

        let exit = match (&mut self.handle).await {
            Ok(Ok(())) => WorkerExit::code(0),
            Ok(Err(e)) => {
                error!("[Worker-{}] Exiting after failure: {}", self.pid, e);
                WorkerExit::code(1)
            }
            Err(e) if e.is_cancelled() => WorkerExit::signal(ABORT_SIGNAL),
            Err(e) => {
                error!("[Worker-{}] Panicked: {}", self.pid, e);
                WorkerExit::code(1)
            }
        };
        self.exit = Some(exit);
        Ok(exit)
    }

    fn start_kill(&mut self) -> Result<()> {
        self.handle.abort();
        Ok(())
    }
}
