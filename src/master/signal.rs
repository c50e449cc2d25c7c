use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 等待 SIGINT / SIGTERM，收到后触发 `shutdown`
///
/// 信号处理器安装失败时只记 warn，对应的分支永远不会触发。
pub(crate) async fn forward_termination(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("[Coordinator] Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("[Coordinator] Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("[Coordinator] Received Ctrl+C signal"),
        () = terminate => info!("[Coordinator] Received SIGTERM signal"),
        () = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
