use std::sync::Arc;
use tracing::{Instrument, error, info_span};

use super::runtime::WorkerRuntime;
use crate::common::traits::PayloadHandler;

/// Worker 进程入口
///
/// 在 stdin/stdout 上跑 `WorkerRuntime`，返回进程退出码：
/// - `0`: 收到流结束
/// - `1`: handler 出错、通道断开或 panic
pub async fn run_worker_process(handler: Arc<dyn PayloadHandler>) -> i32 {
    let pid = std::process::id();

    // panic 一律按崩溃处理，交给 Master 的重启策略
    std::panic::set_hook(Box::new(move |info| {
        error!("[Worker-{}] Panicked: {}", pid, info);
        std::process::exit(1);
    }));

    let mut runtime = WorkerRuntime::new(pid, handler);
    let result = runtime
        .run(tokio::io::stdin(), tokio::io::stdout())
        .instrument(info_span!("worker", pid))
        .await;

    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("[Worker-{}] Exiting after failure: {}", pid, e);
            1
        }
    }
}
