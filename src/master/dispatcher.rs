use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::error::{CoordinationError, Result};
use crate::common::model::{AssignmentRecord, Cursor, Payload};
use crate::common::traits::FetchNext;
use crate::lock::LockStrategy;
use crate::persistence::{CoordinationStore, KeySpace};

/// 调度器 (游标推进的临界区)
///
/// **职责**:
/// 1. 持锁读取游标 / 失效队列
/// 2. 优先回收失效 Payload，否则调用用户的 `fetch_next`
/// 3. 持久化新游标和分配记录
///
/// 所有对存储的写入都发生在锁内。
pub struct Dispatcher {
    store: Arc<dyn CoordinationStore>,
    lock: LockStrategy,
    keys: KeySpace,
    fetch: Arc<dyn FetchNext>,
    reclaim: bool,
    /// 排空开始后拒绝新的调度
    draining: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        lock: LockStrategy,
        keys: KeySpace,
        fetch: Arc<dyn FetchNext>,
        reclaim: bool,
        draining: CancellationToken,
    ) -> Self {
        Self {
            store,
            lock,
            keys,
            fetch,
            reclaim,
            draining,
        }
    }

    /// 为 `worker_id` 取下一个工作单元
    ///
    /// 返回的 Payload 中 `last_id` 已被改写为*上一个*游标值；
    /// 流结束时返回 `no_more_data = true` 的 Payload，可重复调用。
    pub async fn fetch_next(&self, worker_id: u32) -> Result<Payload> {
        self.lock
            .lock_and_execute(|| self.fetch_locked(worker_id))
            .await
    }

    /// 把 Worker 的在途分配登记为失效
    ///
    /// 没有分配记录 (从未拿到过单元，或刚收到流结束) 时什么都不做。
    /// 返回是否真的入队。
    pub async fn mark_impaired(&self, worker_id: u32) -> Result<bool> {
        if !self.reclaim {
            return Ok(false);
        }
        self.lock
            .lock_and_execute(|| async {
                let record_key = self.keys.worker_payload(worker_id);
                if self.store.get(&record_key).await?.is_none() {
                    return Ok(false);
                }
                self.store
                    .rpush(&self.keys.impaired_payloads(), &record_key)
                    .await?;
                warn!(
                    "[Dispatcher] Worker {} payload marked as impaired ({})",
                    worker_id, record_key
                );
                Ok(true)
            })
            .await
    }

    // ==========================================
    // 临界区内部
    // ==========================================

    async fn fetch_locked(&self, worker_id: u32) -> Result<Payload> {
        if self.draining.is_cancelled() {
            return Err(CoordinationError::Draining);
        }

        let record_key = self.keys.worker_payload(worker_id);

        if self.reclaim {
            // 再次请求 = 上一个单元已完成
            self.store.del(&record_key).await?;

            if let Some(payload) = self.pop_impaired().await? {
                let record = AssignmentRecord::new(worker_id, payload.clone());
                self.store
                    .set(&record_key, &serde_json::to_string(&record)?)
                    .await?;
                info!(
                    "[Dispatcher] Reassigned impaired payload (after {:?}) to worker {}",
                    payload.last_id, worker_id
                );
                return Ok(payload);
            }
        }

        let cursor = self.read_cursor().await?;
        if cursor.no_more_data {
            return Ok(Payload::end_of_stream(cursor.last_processed_id));
        }

        let fetched = self
            .fetch
            .fetch_next(cursor.last_processed_id.clone())
            .await
            .map_err(CoordinationError::UserFetch)?;

        let mut payload = match fetched {
            Some(payload) if !payload.no_more_data => payload,
            _ => {
                info!(
                    "[Dispatcher] Stream exhausted at {:?}",
                    cursor.last_processed_id
                );
                let done = Cursor {
                    last_processed_id: cursor.last_processed_id.clone(),
                    no_more_data: true,
                };
                self.write_cursor(&done).await?;
                return Ok(Payload::end_of_stream(cursor.last_processed_id));
            }
        };

        // fetch_next 返回的 last_id 是本批终点，也就是新的游标
        let Some(batch_end) = payload.last_id.take() else {
            return Err(CoordinationError::FetchFailed(
                "fetch_next returned a payload without lastId".to_string(),
            ));
        };
        payload.last_id = cursor.last_processed_id;
        let next = Cursor::at(batch_end);

        if self.reclaim {
            let record = serde_json::to_string(&AssignmentRecord::new(worker_id, payload.clone()))?;
            tokio::try_join!(
                self.write_cursor(&next),
                self.store.set(&record_key, &record)
            )?;
        } else {
            self.write_cursor(&next).await?;
        }

        debug!(
            "[Dispatcher] Worker {} assigned ({:?}, {:?}]",
            worker_id, payload.last_id, next.last_processed_id
        );
        Ok(payload)
    }

    /// 弹出第一个还能解析的失效记录，并删除原记录
    async fn pop_impaired(&self) -> Result<Option<Payload>> {
        let queue = self.keys.impaired_payloads();
        while let Some(record_key) = self.store.lpop(&queue).await? {
            let Some(raw) = self.store.get(&record_key).await? else {
                debug!("[Dispatcher] Impaired record {} already gone", record_key);
                continue;
            };
            self.store.del(&record_key).await?;

            match serde_json::from_str::<AssignmentRecord>(&raw) {
                Ok(record) => return Ok(Some(record.payload)),
                Err(e) => {
                    warn!(
                        "[Dispatcher] Dropping unreadable impaired record {}: {}",
                        record_key, e
                    );
                }
            }
        }
        Ok(None)
    }

    async fn read_cursor(&self) -> Result<Cursor> {
        match self.store.get(&self.keys.last_processed_id()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Cursor::default()),
        }
    }

    async fn write_cursor(&self, cursor: &Cursor) -> Result<()> {
        self.store
            .set(
                &self.keys.last_processed_id(),
                &serde_json::to_string(cursor)?,
            )
            .await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("keys", &self.keys)
            .field("lock", &self.lock)
            .field("reclaim", &self.reclaim)
            .finish_non_exhaustive()
    }
}
