use tracing_subscriber::{EnvFilter, fmt};

use crate::common::config::LoggingConfig;

/// 初始化全局日志
///
/// - 永远写 stderr：Worker 进程的 stdout 被协议独占。
/// - `RUST_LOG` 存在时优先于配置里的 `level`。
/// - 重复调用是安全的 (已经有全局 subscriber 时静默跳过)，测试里可以随便调。
pub fn init_logging(cfg: &LoggingConfig) {
    if !cfg.enabled {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
