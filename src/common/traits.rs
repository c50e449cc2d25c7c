use async_trait::async_trait;
use std::future::Future;

use crate::common::model::{Id, Payload};

// ==========================================
// 1. 拉取接口 (FetchNext)
// ==========================================

/// 用户提供的拉取逻辑
///
/// 只在 Master 的临界区内被调用，同一时刻最多只有一个调用在执行。
///
/// # 返回值
/// - `Ok(Some(payload))`: 新的一批工作。`payload.last_id` 必须是本批的终止 ID。
/// - `Ok(None)`: 流结束，游标会被打上 `no_more_data`。
/// - `Err(e)`: 本轮调度失败。
#[async_trait]
pub trait FetchNext: Send + Sync + 'static {
    async fn fetch_next(&self, last_id: Option<Id>) -> anyhow::Result<Option<Payload>>;
}

#[async_trait]
impl<F, Fut> FetchNext for F
where
    F: Fn(Option<Id>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<Payload>>> + Send + 'static,
{
    async fn fetch_next(&self, last_id: Option<Id>) -> anyhow::Result<Option<Payload>> {
        (self)(last_id).await
    }
}

// ==========================================
// 2. 处理接口 (PayloadHandler)
// ==========================================

/// 用户提供的处理逻辑
///
/// 在 Worker 中执行。返回 `Err` 对 Worker 是致命的：进程以退出码 1 结束，
/// 后续恢复完全交给 Master 的重启与回收策略。
#[async_trait]
pub trait PayloadHandler: Send + Sync + 'static {
    async fn handle(&self, payload: Payload) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> PayloadHandler for F
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> anyhow::Result<()> {
        (self)(payload).await
    }
}
