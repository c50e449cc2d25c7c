use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;

use crate::common::TimeUtils;

// ==========================================
// 1. 游标标识 (Id)
// ==========================================

/// 工作流中的有序标识
///
/// 对核心来说是不透明的：只负责保存、比较和回传，不做任何解释。
/// 序列化时不带标签，`5` 和 `"user-5"` 都是合法的 ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Str(String),
}

impl From<i64> for Id {
    fn from(v: i64) -> Self {
        Id::Int(v)
    }
}

impl From<&str> for Id {
    fn from(v: &str) -> Self {
        Id::Str(v.to_string())
    }
}

impl From<String> for Id {
    fn from(v: String) -> Self {
        Id::Str(v)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(v) => write!(f, "{}", v),
            Id::Str(v) => f.write_str(v),
        }
    }
}

// ==========================================
// 2. 全局游标 (Cursor)
// ==========================================

/// 全局处理进度 (`<prefix>:lastProcessedId`)
///
/// - 只由 Master 在持锁状态下读写。
/// - 永不删除。`no_more_data` 是终态标记，一旦置位后续调度都直接返回流结束。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub last_processed_id: Option<Id>,
    #[serde(default)]
    pub no_more_data: bool,
}

impl Cursor {
    pub fn at(id: impl Into<Id>) -> Self {
        Self {
            last_processed_id: Some(id.into()),
            no_more_data: false,
        }
    }
}

// ==========================================
// 3. 工作载荷 (Payload)
// ==========================================

/// 一个工作单元 (或一批)
///
/// 固定信封 `{lastId, noMoreData}` 加上用户自定义的 `body`。
/// 核心只负责原样透传 `body`，从不解析它。
///
/// `last_id` 的含义随阶段不同：
/// - `fetch_next` 返回时: 本批次的终止 ID (即新的游标位置)。
/// - 下发给 Worker 时: 被 Master 改写为 *上一个* 游标值，handler 由此得知处理窗口 `(last_id, 本批终点]`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub last_id: Option<Id>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_more_data: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

impl Payload {
    /// 用可序列化的业务数据构造 Payload
    pub fn new<B: Serialize>(last_id: impl Into<Id>, body: &B) -> serde_json::Result<Self> {
        Ok(Self::from_value(Some(last_id.into()), serde_json::to_value(body)?))
    }

    pub fn from_value(last_id: Option<Id>, body: Value) -> Self {
        Self {
            last_id,
            no_more_data: false,
            body,
        }
    }

    /// 流结束信号
    pub fn end_of_stream(last_id: Option<Id>) -> Self {
        Self {
            last_id,
            no_more_data: true,
            body: Value::Null,
        }
    }

    /// 把 `body` 解析成具体的业务类型
    pub fn body_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.body)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.no_more_data
    }
}

// ==========================================
// 4. 分配记录 (AssignmentRecord)
// ==========================================

/// Worker 当前持有的 Payload (`<prefix>:workerPayload:<pid>`)
///
/// 仅在开启回收时写入。Worker 请求下一单元时删除；
/// Worker 异常退出时，其 Key 被推入失效队列等待回收。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub worker_id: u32,
    pub payload: Payload,
    /// Unix 时间戳 (秒)
    pub assigned_at: f64,
}

impl AssignmentRecord {
    pub fn new(worker_id: u32, payload: Payload) -> Self {
        Self {
            worker_id,
            payload,
            assigned_at: TimeUtils::now_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_integers_and_strings() {
        let ids: Vec<Id> = serde_json::from_value(json!([7, "user-7"])).unwrap();
        assert_eq!(ids, vec![Id::Int(7), Id::Str("user-7".into())]);
        assert_eq!(Id::from(7).to_string(), "7");
    }

    #[test]
    fn cursor_uses_camel_case_keys() {
        let cursor = Cursor {
            last_processed_id: Some(Id::Int(5)),
            no_more_data: true,
        };
        assert_eq!(
            serde_json::to_value(&cursor).unwrap(),
            json!({ "lastProcessedId": 5, "noMoreData": true })
        );

        let legacy: Cursor = serde_json::from_value(json!({ "lastProcessedId": null })).unwrap();
        assert_eq!(legacy, Cursor::default());
    }

    #[test]
    fn payload_omits_empty_envelope_fields() {
        let payload = Payload::from_value(Some(Id::Int(3)), Value::Null);
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({ "lastId": 3 }));

        let end = Payload::end_of_stream(None);
        assert_eq!(
            serde_json::to_value(&end).unwrap(),
            json!({ "lastId": null, "noMoreData": true })
        );
    }

    #[test]
    fn payload_body_is_threaded_through_untouched() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Range {
            ids: Vec<i64>,
        }

        let payload = Payload::new(10, &Range { ids: vec![8, 9, 10] }).unwrap();
        let wire = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&wire).unwrap();

        assert_eq!(back.last_id, Some(Id::Int(10)));
        assert_eq!(back.body_as::<Range>().unwrap(), Range { ids: vec![8, 9, 10] });
    }
}
