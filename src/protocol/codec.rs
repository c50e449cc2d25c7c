use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::warn;

use super::message::Message;
use crate::common::error::{CoordinationError, Result};

/// 单帧上限 (16 MiB)
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// 日志里最多保留的杂散输出长度
const STRAY_PREVIEW_CHARS: usize = 120;

/// 每条报文都以这个前缀开头 (`type` 是 `Message` 的第一个字段)
const FRAME_PREFIX: &str = "{\"type\"";

/// 按行分帧的 JSON 编解码器
///
/// 每条报文序列化成一行 JSON，以 `\n` 结尾。
/// 底层复用 `LinesCodec`，这里只负责 JSON 这一层。
///
/// 进程模式下 Worker 的 stdout 就是协议通道，handler 里的 `println!` 会混进来：
/// - 不是报文的行记一条 warn 后丢弃
/// - 没有换行的输出会和后面的报文粘成一行，此时取行尾的报文
#[derive(Debug)]
pub struct MessageCodec {
    lines: LinesCodec,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_FRAME_LENGTH),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn map_lines_err(e: LinesCodecError) -> CoordinationError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            CoordinationError::Protocol(format!("frame exceeds {} bytes", MAX_FRAME_LENGTH))
        }
        LinesCodecError::Io(e) => CoordinationError::Io(e),
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CoordinationError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        loop {
            match self.lines.decode(src).map_err(map_lines_err)? {
                // 跳过空行
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match decode_line(&line) {
                    Some(message) => return Ok(Some(message)),
                    None => continue,
                },
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        loop {
            match self.lines.decode_eof(src).map_err(map_lines_err)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match decode_line(&line) {
                    Some(message) => return Ok(Some(message)),
                    None => continue,
                },
                None => return Ok(None),
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CoordinationError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let line = serde_json::to_string(&item)?;
        self.lines.encode(line, dst).map_err(map_lines_err)
    }
}

fn decode_line(line: &str) -> Option<Message> {
    if let Ok(message) = serde_json::from_str(line) {
        return Some(message);
    }

    if let Some(start) = line.rfind(FRAME_PREFIX).filter(|&start| start > 0) {
        if let Ok(message) = serde_json::from_str(&line[start..]) {
            warn!(
                "[Codec] Skipped stray output before message: {:?}",
                preview(&line[..start])
            );
            return Some(message);
        }
    }

    warn!("[Codec] Skipped non-protocol line: {:?}", preview(line));
    None
}

fn preview(text: &str) -> String {
    text.chars().take(STRAY_PREVIEW_CHARS).collect()
}
