use clap::{Parser, ValueEnum};
use rand::Rng;
use std::time::Duration;
use stride::common::model::Id;
use stride::common::{LockConfig, LockKind};
use stride::{LaunchMode, ParallelWorker, ParallelWorkerConfig, Payload};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Launch {
    Process,
    Task,
}

/// 演示程序：把 1..=total 的 ID 按批次分给 Worker 池
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stride-demo",
    version,
    about = "Distribute an ordered ID range across a supervised worker pool"
)]
struct CliArgs {
    /// Worker 数量
    #[arg(long, env = "STRIDE_WORKERS", default_value_t = 4)]
    workers: usize,

    /// 要处理的最大 ID
    #[arg(long, env = "STRIDE_TOTAL", default_value_t = 100)]
    total: i64,

    /// 每批 ID 数量
    #[arg(long, env = "STRIDE_BATCH", default_value_t = 10)]
    batch: i64,

    /// 每批模拟耗时 (毫秒)
    #[arg(long, env = "STRIDE_WORK_MS", default_value_t = 50)]
    work_ms: u64,

    /// handler 随机失败的概率，用来观察重启与回收
    #[arg(long, env = "STRIDE_FAIL_RATE", default_value_t = 0.0)]
    fail_rate: f64,

    /// 开启崩溃回收 (至少一次)
    #[arg(long, env = "STRIDE_RECLAIM", default_value_t = false)]
    reclaim: bool,

    /// Key 前缀
    #[arg(long, env = "STRIDE_PREFIX", default_value_t = String::from("stride-demo"))]
    prefix: String,

    /// Redis 地址，设置后使用 Redis 存储和分布式锁
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Worker 启动方式
    #[arg(long, value_enum, default_value_t = Launch::Process)]
    launch: Launch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    let mut config = ParallelWorkerConfig::default();
    config.key_prefix = args.prefix.clone();
    config.pool.workers = args.workers;
    config.pool.reclaim_reserved_payload_on_fail = args.reclaim;
    config.pool.launch = match args.launch {
        Launch::Process => LaunchMode::Process,
        Launch::Task => LaunchMode::Task,
    };
    if args.redis_url.is_some() {
        config.lock = LockConfig::with_defaults(LockKind::Distributed);
    }

    let total = args.total;
    let batch = args.batch.max(1);
    let work = Duration::from_millis(args.work_ms);
    let fail_rate = args.fail_rate.clamp(0.0, 1.0);

    let mut pool = ParallelWorker::new(config.clone())
        .set_fetch_next(move |last: Option<Id>| async move {
            let start = match last {
                Some(Id::Int(n)) => n + 1,
                Some(other) => anyhow::bail!("unexpected cursor {}", other),
                None => 1,
            };
            if start > total {
                return Ok(None);
            }
            let end = (start + batch - 1).min(total);
            let ids: Vec<i64> = (start..=end).collect();
            Ok(Some(Payload::new(end, &ids)?))
        })
        .set_handler(move |payload: Payload| async move {
            let ids: Vec<i64> = payload.body_as()?;
            tokio::time::sleep(work).await;
            if fail_rate > 0.0 && rand::rng().random_bool(fail_rate) {
                anyhow::bail!("simulated failure on batch after {:?}", payload.last_id);
            }
            info!("[Demo] Processed {} ids after {:?}", ids.len(), payload.last_id);
            Ok(())
        });

    if let Some(url) = args.redis_url.as_deref() {
        pool = pool.redis(url)?;
    }

    let report = pool.start().await?;
    info!("[Demo] Finished: {:?}", report);
    Ok(())
}
