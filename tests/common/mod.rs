#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

use stride::Payload;
use stride::common::model::Id;
use stride::common::{LaunchMode, LoggingConfig, ParallelWorkerConfig};
use stride::launcher::{LaunchedWorker, WorkerExit, WorkerLauncher, WorkerProcess};

/// 任务模式 + 关闭信号监听 + 关闭日志
pub fn task_config(workers: usize, prefix: &str) -> ParallelWorkerConfig {
    let mut cfg = ParallelWorkerConfig::default();
    cfg.key_prefix = prefix.to_string();
    cfg.pool.workers = workers;
    cfg.pool.launch = LaunchMode::Task;
    cfg.pool.handle_signals = false;
    cfg.pool.dispatch_retry_base_ms = 1;
    cfg.logging = LoggingConfig {
        enabled: false,
        ..LoggingConfig::default()
    };
    cfg
}

/// 按批次产出 `1..=total`，统计调用次数
#[derive(Clone, Default)]
pub struct RangeSource {
    pub total: i64,
    pub batch: i64,
    pub calls: Arc<AtomicUsize>,
}

impl RangeSource {
    pub fn new(total: i64, batch: i64) -> Self {
        Self {
            total,
            batch,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn next(&self, last: Option<Id>) -> anyhow::Result<Option<Payload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = match last {
            Some(Id::Int(n)) => n + 1,
            Some(other) => anyhow::bail!("unexpected cursor {}", other),
            None => 1,
        };
        if start > self.total {
            return Ok(None);
        }
        let end = (start + self.batch - 1).min(self.total);
        let ids: Vec<i64> = (start..=end).collect();
        Ok(Some(Payload::new(end, &ids)?))
    }
}

/// 收集 handler 看到的 ID
#[derive(Clone, Default)]
pub struct Seen(pub Arc<Mutex<Vec<i64>>>);

impl Seen {
    pub fn record(&self, payload: &Payload) -> anyhow::Result<()> {
        let ids: Vec<i64> = payload.body_as()?;
        self.0.lock().extend(ids);
        Ok(())
    }

    pub fn ids(&self) -> Vec<i64> {
        self.0.lock().clone()
    }
}

/// 轮询直到条件成立 (最多 5 秒)
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// 按脚本运行的 Worker
///
/// 每个 Worker 是一个拿着内存管道另一端的任务，脚本的返回值就是退出码。
/// 用来模拟真实 Worker 做不到或者很难稳定复现的行为。
pub struct ScriptedLauncher<F> {
    script: F,
    next_pid: AtomicU32,
}

impl<F, Fut> ScriptedLauncher<F>
where
    F: Fn(u32, DuplexStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = i32> + Send + 'static,
{
    pub fn new(script: F) -> Arc<Self> {
        Arc::new(Self {
            script,
            next_pid: AtomicU32::new(1),
        })
    }
}

#[async_trait]
impl<F, Fut> WorkerLauncher for ScriptedLauncher<F>
where
    F: Fn(u32, DuplexStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = i32> + Send + 'static,
{
    async fn launch(&self, _slot: usize) -> stride::Result<LaunchedWorker> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (master_io, worker_io) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(master_io);
        let handle = tokio::spawn((self.script)(pid, worker_io));

        Ok(LaunchedWorker {
            pid,
            reader: Box::new(reader),
            writer: Box::new(writer),
            process: Box::new(ScriptedProcess { handle, exit: None }),
        })
    }
}

struct ScriptedProcess {
    handle: JoinHandle<i32>,
    exit: Option<WorkerExit>,
}

#[async_trait]
impl WorkerProcess for ScriptedProcess {
    async fn wait(&mut self) -> stride::Result<WorkerExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let exit = match (&mut self.handle).await {
            Ok(code) => WorkerExit::code(code),
            Err(e) if e.is_cancelled() => WorkerExit::signal(9),
            Err(_) => WorkerExit::code(1),
        };
        self.exit = Some(exit);
        Ok(exit)
    }

    fn start_kill(&mut self) -> stride::Result<()> {
        self.handle.abort();
        Ok(())
    }
}
