use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::common::error::Result;
use crate::launcher::{LaunchedWorker, WorkerExit, WorkerLauncher};
use crate::master::context::MasterContext;
use crate::master::{PoolReport, StopReason, session, signal};
use crate::policy::{RestartDecision, RestartPolicy};

/// 存活 Worker 的句柄
struct LiveWorker {
    slot: usize,
    /// 取消后监督任务会杀掉进程
    kill: CancellationToken,
    session: JoinHandle<()>,
}

/// 监督任务上报的退出事件
#[derive(Debug)]
struct ExitNotice {
    worker_id: u32,
    exit: WorkerExit,
}

enum Event {
    Exit(Option<ExitNotice>),
    Shutdown,
}

/// Worker 池协调器 (Master)
///
/// **职责**:
/// 1. 启动 `workers` 个 Worker，并为每个 Worker 挂一个会话任务和一个监督任务
/// 2. Worker 异常退出时回收其在途单元，并在重启预算内补位
/// 3. 收到关机信号后排空：登记所有在途单元、杀掉全部 Worker、不再调度
pub struct Coordinator {
    ctx: Arc<MasterContext>,
    launcher: Arc<dyn WorkerLauncher>,
    restart: RestartPolicy,
    live: HashMap<u32, LiveWorker>,
    exits_tx: mpsc::UnboundedSender<ExitNotice>,
    exits_rx: mpsc::UnboundedReceiver<ExitNotice>,
    started: usize,
    limit_reached: bool,
    stop_reason: StopReason,
    /// drain 已执行 (在途单元已登记、kill 已下发)
    drained: bool,
}

impl Coordinator {
    pub fn new(ctx: MasterContext, launcher: Arc<dyn WorkerLauncher>) -> Self {
        let restart = RestartPolicy::from_config(&ctx.config);
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        Self {
            ctx: Arc::new(ctx),
            launcher,
            restart,
            live: HashMap::new(),
            exits_tx,
            exits_rx,
            started: 0,
            limit_reached: false,
            stop_reason: StopReason::Drained,
            drained: false,
        }
    }

    /// 运行到所有 Worker 退出
    ///
    /// 只有首批 Worker 启动失败才返回 `Err`；运行期的崩溃、重启耗尽都只记录日志。
    pub async fn run(mut self) -> Result<PoolReport> {
        let workers = self.ctx.config.workers;
        info!("[Coordinator] Starting pool with {} workers", workers);
        self.ctx.observers.on_start(workers).await;

        let signals = self
            .ctx
            .config
            .handle_signals
            .then(|| tokio::spawn(signal::forward_termination(self.ctx.shutdown.clone())));

        for slot in 0..workers {
            if let Err(e) = self.spawn_worker(slot).await {
                error!("[Coordinator] Failed to start worker for slot {}: {}", slot, e);
                self.drain().await;
                self.wait_for_exits().await;
                if let Some(handle) = signals {
                    handle.abort();
                }
                return Err(e);
            }
        }

        let shutdown = self.ctx.shutdown.clone();

        while !self.live.is_empty() {
            let drained = self.drained;
            // 关机信号优先于同时到达的退出事件
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled(), if !drained => Event::Shutdown,
                notice = self.exits_rx.recv() => Event::Exit(notice),
            };

            match event {
                Event::Exit(Some(notice)) => self.handle_exit(notice).await,
                Event::Exit(None) => break,
                Event::Shutdown => self.shut_down().await,
            }
        }

        if let Some(handle) = signals {
            handle.abort();
        }

        let report = PoolReport {
            stop_reason: self.stop_reason,
            workers_started: self.started,
            workers_restarted: self.restart.restarted(),
            restart_limit_reached: self.limit_reached,
        };
        info!(
            "[Coordinator] All workers stopped ({:?}, {} restarts)",
            report.stop_reason, report.workers_restarted
        );
        self.ctx.observers.before_stop(&report).await;
        Ok(report)
    }

    async fn spawn_worker(&mut self, slot: usize) -> Result<u32> {
        let LaunchedWorker {
            pid,
            reader,
            writer,
            mut process,
        } = self.launcher.launch(slot).await?;

        let kill = CancellationToken::new();

        let session = tokio::spawn(
            session::run(self.ctx.clone(), pid, reader, writer, kill.clone())
                .instrument(info_span!("worker", pid)),
        );

        // 监督任务：等进程退出，或在 kill 被取消时杀掉它
        let exits = self.exits_tx.clone();
        let kill_requested = kill.clone();
        tokio::spawn(async move {
            let exited = tokio::select! {
                result = process.wait() => Some(result),
                _ = kill_requested.cancelled() => None,
            };
            let result = match exited {
                Some(result) => result,
                None => {
                    if let Err(e) = process.start_kill() {
                        warn!("[Coordinator] Failed to kill worker {}: {}", pid, e);
                    }
                    process.wait().await
                }
            };
            let exit = result.unwrap_or_else(|e| {
                warn!("[Coordinator] Lost track of worker {}: {}", pid, e);
                WorkerExit::default()
            });
            let _ = exits.send(ExitNotice {
                worker_id: pid,
                exit,
            });
        });

        self.live.insert(
            pid,
            LiveWorker {
                slot,
                kill,
                session,
            },
        );
        self.started += 1;

        info!("[Coordinator] Worker {} started (slot {})", pid, slot);
        self.ctx.observers.on_worker_started(pid, slot).await;
        Ok(pid)
    }

    async fn handle_exit(&mut self, notice: ExitNotice) {
        let ExitNotice { worker_id, exit } = notice;
        let Some(worker) = self.live.remove(&worker_id) else {
            return;
        };

        // 会话可能正持锁调度，不能中途打断：通知它在下一轮退出，并等它收尾
        worker.kill.cancel();
        if let Err(e) = worker.session.await {
            warn!("[Coordinator] Session of worker {} ended abnormally: {}", worker_id, e);
        }

        if exit.success() {
            info!("[Coordinator] Worker {} exited cleanly", worker_id);
        } else {
            warn!(
                "[Coordinator] Worker {} exited abnormally (code: {:?}, signal: {:?})",
                worker_id, exit.code, exit.signal
            );
        }
        self.ctx.observers.on_worker_exited(worker_id, &exit).await;

        // 排空后的退出由 drain 负责登记
        if self.drained {
            return;
        }

        // 信号已到但主循环还没来得及处理：先排空其余 Worker，不再补位
        if self.ctx.shutdown.is_cancelled() {
            self.shut_down().await;
            if !exit.success() {
                self.mark_impaired(worker_id).await;
            }
            return;
        }

        if exit.success() {
            return;
        }
        self.mark_impaired(worker_id).await;

        match self.restart.on_abnormal_exit() {
            RestartDecision::Respawn => {
                info!(
                    "[Coordinator] Restarting slot {} ({}/{})",
                    worker.slot,
                    self.restart.restarted(),
                    self.restart.max()
                );
                if let Err(e) = self.spawn_worker(worker.slot).await {
                    error!(
                        "[Coordinator] Failed to restart worker for slot {}: {}",
                        worker.slot, e
                    );
                }
            }
            RestartDecision::LimitReached => {
                error!(
                    "[Coordinator] Max allowed restarts limit reached ({}), slot {} will not be replaced",
                    self.restart.max(),
                    worker.slot
                );
                self.limit_reached = true;
                self.ctx
                    .observers
                    .on_restart_limit_reached(self.restart.max())
                    .await;
            }
            RestartDecision::Disabled => {
                debug!("[Coordinator] Restart disabled, slot {} stays empty", worker.slot);
            }
        }
    }

    async fn shut_down(&mut self) {
        self.stop_reason = StopReason::Signal;
        self.drain().await;
    }

    async fn mark_impaired(&self, worker_id: u32) {
        if let Err(e) = self.ctx.dispatcher.mark_impaired(worker_id).await {
            error!(
                "[Coordinator] Failed to mark worker {} payload as impaired: {}",
                worker_id, e
            );
        }
    }

    /// 排空：停止调度，登记在途单元，杀掉全部 Worker
    async fn drain(&mut self) {
        if self.drained {
            return;
        }
        self.drained = true;
        info!("[Coordinator] Draining {} workers", self.live.len());
        self.ctx.draining.cancel();

        let ids: Vec<u32> = self.live.keys().copied().collect();
        for worker_id in ids {
            self.mark_impaired(worker_id).await;
        }

        for worker in self.live.values() {
            worker.kill.cancel();
        }
    }

    async fn wait_for_exits(&mut self) {
        while !self.live.is_empty() {
            match self.exits_rx.recv().await {
                Some(notice) => self.handle_exit(notice).await,
                None => break,
            }
        }
    }
}
