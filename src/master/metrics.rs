use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::common::model::Payload;
use crate::launcher::WorkerExit;
use crate::master::observer::PoolObserver;

/// Worker 池核心指标
// 使用 Atomic 保证高并发下的计数性能
#[derive(Debug, Default, Serialize)]
pub struct PoolMetrics {
    // --- 瞬时状态 (Gauges) ---
    /// 当前存活的 Worker 数
    pub live_workers: AtomicUsize,

    // --- 累积计数 (Counters) ---
    /// 历史下发的单元数 (含流结束信号)
    pub dispatched: AtomicU64,

    /// 正常退出的 Worker 数
    pub clean_exits: AtomicU64,

    /// 异常退出的 Worker 数
    pub crashes: AtomicU64,

    /// 重启次数耗尽的次数
    pub restart_limit_hits: AtomicU64,
}

impl PoolMetrics {
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Relaxed)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn clean_exits(&self) -> u64 {
        self.clean_exits.load(Ordering::Relaxed)
    }

    pub fn crashes(&self) -> u64 {
        self.crashes.load(Ordering::Relaxed)
    }

    pub fn restart_limit_hits(&self) -> u64 {
        self.restart_limit_hits.load(Ordering::Relaxed)
    }
}

/// 把生命周期事件折算成 `PoolMetrics`
pub struct MetricsObserver {
    metrics: Arc<PoolMetrics>,
}

impl MetricsObserver {
    pub fn new(metrics: Arc<PoolMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl PoolObserver for MetricsObserver {
    async fn on_worker_started(&self, _worker_id: u32, _slot: usize) {
        self.metrics.live_workers.fetch_add(1, Ordering::Relaxed);
    }

    async fn on_dispatch(&self, _worker_id: u32, _payload: &Payload) {
        self.metrics.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    async fn on_worker_exited(&self, _worker_id: u32, exit: &WorkerExit) {
        self.metrics.live_workers.fetch_sub(1, Ordering::Relaxed);
        if exit.success() {
            self.metrics.clean_exits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.crashes.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn on_restart_limit_reached(&self, _max_restarts: usize) {
        self.metrics.restart_limit_hits.fetch_add(1, Ordering::Relaxed);
    }
}
