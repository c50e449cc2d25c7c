use async_trait::async_trait;
use std::time::Duration;

use crate::common::error::Result;

// ==========================================
// 1. 协调存储接口 (CoordinationStore)
// ==========================================

/// 协调状态存储
///
/// **职责**: 保存全局游标、Worker 分配记录以及失效 Payload 队列。
/// **特点**:
/// - 只有 Master 访问，且所有写操作都在锁内完成。
/// - 值是不透明的 JSON 字符串，核心只要求原样往返。
/// - 通常由 Redis 或内存实现
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// 读取字符串值，不存在返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 覆盖写入
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 删除 Key (不存在时不报错)
    async fn del(&self, key: &str) -> Result<()>;

    /// 追加到列表尾部
    async fn rpush(&self, key: &str, value: &str) -> Result<()>;

    /// 从列表头部弹出
    async fn lpop(&self, key: &str) -> Result<Option<String>>;
}

// ==========================================
// 2. 锁后端接口 (LockBackend)
// ==========================================

/// 分布式锁的单个后端实例
///
/// quorum 锁会在 N 个相互独立的实例上同时执行抢锁/释放协议。
/// 两个操作都必须是原子的：
/// - `try_acquire` 等价于 `SET key token NX PX ttl`
/// - `release` 等价于 "值等于 token 才 DEL"，防止误删别人的锁
#[async_trait]
pub trait LockBackend: Send + Sync + 'static {
    /// 尝试占锁，成功返回 `true`
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// 释放自己持有的锁，确实删除了返回 `true`
    async fn release(&self, key: &str, token: &str) -> Result<bool>;
}
