/// 存储 Key 布局
///
/// 所有 Key 都挂在同一个前缀下：
/// - `<prefix>:lastProcessedId` 全局游标
/// - `<prefix>:lock` 临界区锁
/// - `<prefix>:workerPayload:<pid>` Worker 分配记录
/// - `<prefix>:impairedPayloads` 失效队列 (List)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn last_processed_id(&self) -> String {
        format!("{}:lastProcessedId", self.prefix)
    }

    pub fn lock(&self) -> String {
        format!("{}:lock", self.prefix)
    }

    pub fn worker_payload(&self, worker_id: u32) -> String {
        format!("{}:workerPayload:{}", self.prefix, worker_id)
    }

    pub fn impaired_payloads(&self) -> String {
        format!("{}:impairedPayloads", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_the_configured_prefix() {
        let keys = KeySpace::new("users-sync");
        assert_eq!(keys.last_processed_id(), "users-sync:lastProcessedId");
        assert_eq!(keys.lock(), "users-sync:lock");
        assert_eq!(keys.worker_payload(4242), "users-sync:workerPayload:4242");
        assert_eq!(keys.impaired_payloads(), "users-sync:impairedPayloads");
    }
}
