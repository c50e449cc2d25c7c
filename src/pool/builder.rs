use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::common::config::{LaunchMode, ParallelWorkerConfig};
use crate::common::error::{CoordinationError, Result};
use crate::common::logging::init_logging;
use crate::common::traits::{FetchNext, PayloadHandler};
use crate::launcher::{ProcessLauncher, TaskLauncher, WorkerLauncher};
use crate::lock::LockStrategy;
use crate::master::{
    Coordinator, Dispatcher, MasterContext, MetricsObserver, Observers, PoolMetrics, PoolObserver,
    PoolReport,
};
use crate::persistence::{CoordinationStore, KeySpace, LockBackend, MemoryStore};
use crate::policy::DispatchBackoff;
use crate::pool::Role;
use crate::worker::run_worker_process;

/// 并行 Worker 池 (用户入口)
///
/// 用于一步步配置并启动整个系统：
/// Config + Store + Lock -> Dispatcher -> Coordinator
///
/// 同一个可执行文件既是 Master 也是 Worker：`start()` 会根据角色分流。
/// Worker 进程里 `start()` 不会返回，处理完后直接以对应退出码结束进程。
pub struct ParallelWorker {
    /// 必填: 全局配置
    config: ParallelWorkerConfig,
    /// 协调状态存储 (默认内存存储)
    store: Option<Arc<dyn CoordinationStore>>,
    /// 分布式锁后端 (仅 distributed 锁需要)
    lock_backends: Vec<Arc<dyn LockBackend>>,
    /// 选填: 生命周期钩子
    observers: Vec<Box<dyn PoolObserver>>,
    /// 全局统计指标 (总是注入)
    metrics: Arc<PoolMetrics>,
    /// 全局停机信号 (可选注入，用于多组件协同)
    shutdown: Option<CancellationToken>,
    /// 选填: 自定义启动器 (默认按 `pool.launch` 选择)
    launcher: Option<Arc<dyn WorkerLauncher>>,
    fetch_next: Option<Arc<dyn FetchNext>>,
    handler: Option<Arc<dyn PayloadHandler>>,
}

impl ParallelWorker {
    pub fn new(config: ParallelWorkerConfig) -> Self {
        Self {
            config,
            store: None,
            lock_backends: Vec::new(),
            observers: Vec::new(),
            metrics: Arc::new(PoolMetrics::default()),
            shutdown: None,
            launcher: None,
            fetch_next: None,
            handler: None,
        }
    }

    /// [可选] 指定协调状态存储
    pub fn store(mut self, store: Arc<dyn CoordinationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// [可选] 指定分布式锁的后端实例
    pub fn lock_backends(mut self, backends: Vec<Arc<dyn LockBackend>>) -> Self {
        self.lock_backends = backends;
        self
    }

    /// [可选] 内存存储同时作为状态存储和锁后端
    pub fn memory(self, store: MemoryStore) -> Self {
        let backend: Arc<dyn LockBackend> = Arc::new(store.clone());
        self.store(Arc::new(store)).lock_backends(vec![backend])
    }

    /// [可选] 连接 Redis，同时作为状态存储和锁后端
    #[cfg(feature = "distributed")]
    pub fn redis(self, url: &str) -> Result<Self> {
        let store = crate::persistence::RedisStore::new(url, self.config.pool.workers + 2)?;
        let backend: Arc<dyn LockBackend> = Arc::new(store.clone());
        Ok(self.store(Arc::new(store)).lock_backends(vec![backend]))
    }

    /// [可选] 注入生命周期钩子
    pub fn add_observer<O: PoolObserver>(mut self, observer: O) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// 运行指标 (启动前后都可以读取)
    pub fn metrics(&self) -> Arc<PoolMetrics> {
        self.metrics.clone()
    }

    /// [可选] 外部停机信号，取消后触发排空
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// [可选] 自定义 Worker 启动器
    pub fn launcher(mut self, launcher: Arc<dyn WorkerLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// [必填] 拉取逻辑 (只在 Master 中执行)
    pub fn set_fetch_next<F: FetchNext>(mut self, fetch: F) -> Self {
        self.fetch_next = Some(Arc::new(fetch));
        self
    }

    /// [必填] 处理逻辑 (只在 Worker 中执行)
    pub fn set_handler<H: PayloadHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// [核心] 启动
    ///
    /// - Master: 运行协调器直到所有 Worker 退出，返回运行报告
    /// - Worker (进程模式的子进程): 处理到流结束后退出进程，不会返回
    pub async fn start(self) -> Result<PoolReport> {
        let fetch_next = self.fetch_next.clone().ok_or_else(|| {
            CoordinationError::Config("\"fetch_next\" callback is not set".to_string())
        })?;
        let handler = self.handler.clone().ok_or_else(|| {
            CoordinationError::Config("\"handler\" callback is not set".to_string())
        })?;
        self.config.validate()?;
        init_logging(&self.config.logging);

        match Role::current() {
            Role::Worker { slot } => {
                debug!("[ParallelWorker] Running as worker for slot {}", slot);
                let code = run_worker_process(handler).await;
                std::process::exit(code);
            }
            _ => self.run_master(fetch_next, handler).await,
        }
    }

    async fn run_master(
        self,
        fetch_next: Arc<dyn FetchNext>,
        handler: Arc<dyn PayloadHandler>,
    ) -> Result<PoolReport> {
        let config = self.config;
        let keys = KeySpace::new(config.key_prefix.clone());

        // 未指定存储时退回内存存储 (只适用于单 Master)
        let (store, fallback_backend) = match self.store {
            Some(store) => (store, None),
            None => {
                let memory = MemoryStore::new();
                let backend: Arc<dyn LockBackend> = Arc::new(memory.clone());
                let store: Arc<dyn CoordinationStore> = Arc::new(memory);
                (store, Some(backend))
            }
        };
        let lock_backends = if self.lock_backends.is_empty() {
            fallback_backend.into_iter().collect()
        } else {
            self.lock_backends
        };

        let lock = LockStrategy::from_config(&config.lock, keys.lock(), lock_backends)?;
        let shutdown = self.shutdown.unwrap_or_default();
        // 信号一到就停止调度，不必等协调器轮到处理它
        let draining = shutdown.child_token();

        let dispatcher = Dispatcher::new(
            store,
            lock,
            keys,
            fetch_next,
            config.pool.reclaim_reserved_payload_on_fail,
            draining.clone(),
        );

        let launcher: Arc<dyn WorkerLauncher> = match self.launcher {
            Some(launcher) => launcher,
            None => match config.pool.launch {
                LaunchMode::Process => Arc::new(ProcessLauncher::current_exe()?),
                LaunchMode::Task => Arc::new(TaskLauncher::new(handler)),
            },
        };

        info!(
            "[ParallelWorker] Master {} starting ({:?} lock, {:?} launch, prefix \"{}\")",
            std::process::id(),
            config.lock.kind(),
            config.pool.launch,
            config.key_prefix
        );

        let mut observers = Observers::new(self.observers);
        observers.push(Box::new(MetricsObserver::new(self.metrics.clone())));

        let ctx = MasterContext {
            backoff: DispatchBackoff::from_config(&config.pool),
            config: config.pool,
            dispatcher,
            observers,
            shutdown,
            draining,
        };

        Coordinator::new(ctx, launcher).run().await
    }
}
