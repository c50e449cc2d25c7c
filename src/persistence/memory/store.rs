use super::MemoryStore;
use crate::common::error::Result;
use crate::persistence::traits::CoordinationStore;
use async_trait::async_trait;

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        // Redis 的 DEL 对任意类型都生效
        self.values.remove(key);
        self.lists.remove(key);
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        self.lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let popped = match self.lists.get_mut(key) {
            Some(mut list) => list.pop_front(),
            None => None,
        };
        // 空列表等价于不存在
        self.lists.remove_if(key, |_, l| l.is_empty());
        Ok(popped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_round_trip_and_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "{\"lastProcessedId\":3}").await.unwrap();
        assert_eq!(
            store.get("k").await.unwrap().as_deref(),
            Some("{\"lastProcessedId\":3}")
        );

        store.del("k").await.unwrap();
        store.del("missing").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lists_are_fifo() {
        let store = MemoryStore::new();
        store.rpush("q", "a").await.unwrap();
        store.rpush("q", "b").await.unwrap();
        assert_eq!(store.list_len("q"), 2);

        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.lpop("q").await.unwrap(), None);
        assert_eq!(store.list_len("q"), 0);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("shared", "1").await.unwrap();
        assert_eq!(b.get("shared").await.unwrap().as_deref(), Some("1"));
    }
}
