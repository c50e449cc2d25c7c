use serde::{Deserialize, Serialize};

use crate::common::model::Payload;

/// 报文类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// Worker -> Master: 请求下一单元
    GetNextPayload,
    /// Master -> Worker: 下发单元 (或流结束)
    SetNextPayload,
}

/// Master 与 Worker 之间的报文
///
/// 线上格式: `{"type": "getNextPayload"}` / `{"type": "setNextPayload", "payload": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Message {
    pub fn get_next_payload() -> Self {
        Self {
            kind: MessageType::GetNextPayload,
            payload: None,
        }
    }

    pub fn set_next_payload(payload: Payload) -> Self {
        Self {
            kind: MessageType::SetNextPayload,
            payload: Some(payload),
        }
    }
}
