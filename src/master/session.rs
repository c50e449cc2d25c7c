use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::common::error::{CoordinationError, Result};
use crate::common::model::Payload;
use crate::master::context::MasterContext;
use crate::policy::RetryDecision;
use crate::protocol::{Message, MessageCodec, MessageType};

/// 单个 Worker 的会话循环
///
/// 读 `getNextPayload` -> 调度 -> 回 `setNextPayload`，直到：
/// - Worker 关闭通道 (进程退出)
/// - `kill` 被取消 (排空或监督方要求)
/// - 调度出现不可恢复的错误 (此时主动取消 `kill`，由监督方杀掉 Worker)
pub(crate) async fn run<R, W>(
    ctx: Arc<MasterContext>,
    worker_id: u32,
    reader: R,
    writer: W,
    kill: CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut inbound = FramedRead::new(reader, MessageCodec::new());
    let mut outbound = FramedWrite::new(writer, MessageCodec::new());

    loop {
        let next = tokio::select! {
            _ = kill.cancelled() => break,
            next = inbound.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!("[Session-{}] Dropping worker after bad message: {}", worker_id, e);
                kill.cancel();
                break;
            }
            None => {
                trace!("[Session-{}] Worker closed its channel", worker_id);
                break;
            }
        };

        if message.kind != MessageType::GetNextPayload {
            warn!(
                "[Session-{}] Ignoring unexpected {:?} from worker",
                worker_id, message.kind
            );
            continue;
        }

        if ctx.is_draining() {
            debug!("[Session-{}] Draining, request ignored", worker_id);
            break;
        }

        let payload = match dispatch(&ctx, worker_id, &kill).await {
            Ok(payload) => payload,
            Err(CoordinationError::Draining) => {
                debug!("[Session-{}] Draining, request ignored", worker_id);
                break;
            }
            Err(_) if kill.is_cancelled() => {
                debug!("[Session-{}] Worker gone, dispatch abandoned", worker_id);
                break;
            }
            Err(e) => {
                error!("[Session-{}] Failed to get next payload: {}", worker_id, e);
                kill.cancel();
                break;
            }
        };

        ctx.observers.on_dispatch(worker_id, &payload).await;

        if let Err(e) = outbound.send(Message::set_next_payload(payload)).await {
            warn!("[Session-{}] Failed to deliver payload: {}", worker_id, e);
            break;
        }
    }
}

/// 调度一次，可重试的错误按退避策略重试
///
/// 只在两次尝试之间响应 `kill`，已经进入临界区的调度总会跑完。
async fn dispatch(
    ctx: &MasterContext,
    worker_id: u32,
    kill: &CancellationToken,
) -> Result<Payload> {
    let mut attempt = 0u32;
    loop {
        let err = match ctx.dispatcher.fetch_next(worker_id).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        attempt += 1;
        match ctx.backoff.decide(attempt, &err) {
            RetryDecision::Retry(delay) => {
                warn!(
                    "[Session-{}] Dispatch attempt {} failed: {}. Retrying in {:?}",
                    worker_id, attempt, err, delay
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.draining.cancelled() => return Err(CoordinationError::Draining),
                    _ = kill.cancelled() => return Err(err),
                }
            }
            RetryDecision::GiveUp => return Err(err),
        }
    }
}
