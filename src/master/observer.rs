use async_trait::async_trait;

use crate::common::model::Payload;
use crate::launcher::WorkerExit;
use crate::master::PoolReport;

/// 协调器生命周期钩子
///
/// 用户可以通过实现此 Trait 来观察 Worker 池的运行。
/// 钩子按注册顺序依次调用，只能观察，不能阻止或否决关机。
/// 常见用途：
/// - 自定义监控 (Metrics)
/// - 崩溃报警 (Alerting)
/// - 停机前关闭外部连接
#[async_trait]
pub trait PoolObserver: Send + Sync + 'static {
    /// [生命周期] 首批 Worker 启动前调用
    async fn on_start(&self, _workers: usize) {}

    /// [Worker] 新 Worker 已启动 (包括重启的替补)
    async fn on_worker_started(&self, _worker_id: u32, _slot: usize) {}

    /// [调度] 一个单元已下发给 Worker
    async fn on_dispatch(&self, _worker_id: u32, _payload: &Payload) {}

    /// [Worker] Worker 已退出
    async fn on_worker_exited(&self, _worker_id: u32, _exit: &WorkerExit) {}

    /// [重启] 重启次数已耗尽，该槽位不再补位
    async fn on_restart_limit_reached(&self, _max_restarts: usize) {}

    /// [生命周期] 最后一个 Worker 退出后、`run` 返回前调用
    async fn before_stop(&self, _report: &PoolReport) {}
}

/// 观察者集合
#[derive(Default)]
pub struct Observers {
    inner: Vec<Box<dyn PoolObserver>>,
}

impl Observers {
    pub fn new(inner: Vec<Box<dyn PoolObserver>>) -> Self {
        Self { inner }
    }

    pub fn push(&mut self, observer: Box<dyn PoolObserver>) {
        self.inner.push(observer);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub async fn on_start(&self, workers: usize) {
        for o in self.inner.iter() {
            o.on_start(workers).await;
        }
    }

    pub async fn on_worker_started(&self, worker_id: u32, slot: usize) {
        for o in self.inner.iter() {
            o.on_worker_started(worker_id, slot).await;
        }
    }

    pub async fn on_dispatch(&self, worker_id: u32, payload: &Payload) {
        for o in self.inner.iter() {
            o.on_dispatch(worker_id, payload).await;
        }
    }

    pub async fn on_worker_exited(&self, worker_id: u32, exit: &WorkerExit) {
        for o in self.inner.iter() {
            o.on_worker_exited(worker_id, exit).await;
        }
    }

    pub async fn on_restart_limit_reached(&self, max_restarts: usize) {
        for o in self.inner.iter() {
            o.on_restart_limit_reached(max_restarts).await;
        }
    }

    pub async fn before_stop(&self, report: &PoolReport) {
        for o in self.inner.iter() {
            o.before_stop(report).await;
        }
    }
}
