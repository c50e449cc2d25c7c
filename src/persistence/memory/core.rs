use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Instant,
};

/// 内存协调存储 (In-Memory Store)
///
/// 同时实现了 CoordinationStore 和 LockBackend。
/// 单进程场景 (TaskLauncher / 测试) 下替代 Redis。
/// 内部全是 Arc，Clone 后共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// 【字符串】Key -> Value
    /// - DashMap: 分片锁，高并发读写不排队
    pub(super) values: Arc<DashMap<String, String>>,

    /// 【列表】Key -> 队列
    pub(super) lists: Arc<DashMap<String, VecDeque<String>>>,

    /// 【锁租约】Key -> (Token, 过期时间)
    /// 抢锁需要 "检查 + 写入" 原子完成，所以单独用一把 Mutex
    pub(super) leases: Arc<Mutex<HashMap<String, Lease>>>,
}

#[derive(Debug, Clone)]
pub(super) struct Lease {
    pub token: String,
    pub expires_at: Instant,
}

impl Lease {
    pub fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 列表长度 (测试/观测用)
    pub fn list_len(&self, key: &str) -> usize {
        self.lists.get(key).map(|l| l.len()).unwrap_or(0)
    }

    /// 当前持有锁的 Token (已过期视为无人持有)
    pub fn lock_holder(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock();
        leases
            .get(key)
            .filter(|l| l.is_live(Instant::now()))
            .map(|l| l.token.clone())
    }
}
