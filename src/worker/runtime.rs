use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use crate::common::error::{CoordinationError, Result};
use crate::common::traits::PayloadHandler;
use crate::protocol::{Message, MessageCodec, MessageType};

/// Worker 状态机
///
/// `Starting -> AwaitingPayload -> Processing -> AwaitingPayload -> ... -> Stopped`
/// 任意阶段出错都会进入 `Crashed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    AwaitingPayload,
    Processing,
    /// 收到流结束，正常退出
    Stopped,
    /// 异常退出
    Crashed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Crashed)
    }
}

/// Worker 端运行时
///
/// 与传输无关：进程模式下跑在 stdin/stdout 上，任务模式下跑在内存管道上。
/// Worker 自己从不判断是否还有数据，只认 Master 下发的 `noMoreData`。
pub struct WorkerRuntime {
    pid: u32,
    handler: Arc<dyn PayloadHandler>,
    state: WorkerState,
    processed: u64,
}

impl WorkerRuntime {
    pub fn new(pid: u32, handler: Arc<dyn PayloadHandler>) -> Self {
        Self {
            pid,
            handler,
            state: WorkerState::Starting,
            processed: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// 已处理的 Payload 数量
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// 运行到流结束 (`Ok`) 或出错 (`Err`)
    ///
    /// handler 的错误不会在进程内重试，直接返回给调用方决定退出码。
    pub async fn run<R, W>(&mut self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = self.drive(reader, writer).await;
        self.state = match result {
            Ok(()) => WorkerState::Stopped,
            Err(_) => WorkerState::Crashed,
        };
        result
    }

    async fn drive<R, W>(&mut self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut inbound = FramedRead::new(reader, MessageCodec::new());
        let mut outbound = FramedWrite::new(writer, MessageCodec::new());

        self.state = WorkerState::AwaitingPayload;
        outbound.send(Message::get_next_payload()).await?;

        loop {
            let message = match inbound.next().await {
                Some(message) => message?,
                None => return Err(CoordinationError::ChannelClosed),
            };

            if message.kind != MessageType::SetNextPayload {
                return Err(CoordinationError::Protocol(format!(
                    "worker {} received unexpected {:?}",
                    self.pid, message.kind
                )));
            }

            let payload = message.payload.ok_or_else(|| {
                CoordinationError::Protocol("setNextPayload without payload".to_string())
            })?;

            if payload.is_end_of_stream() {
                info!(
                    "[Worker-{}] No more data, stopping after {} payloads",
                    self.pid, self.processed
                );
                return Ok(());
            }

            self.state = WorkerState::Processing;
            debug!("[Worker-{}] Processing payload after {:?}", self.pid, payload.last_id);
            self.handler
                .handle(payload)
                .await
                .map_err(CoordinationError::UserHandler)?;
            self.processed += 1;

            self.state = WorkerState::AwaitingPayload;
            outbound.send(Message::get_next_payload()).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::model::{Id, Payload};
    use parking_lot::Mutex;
    use serde_json::json;

    type Master = (
        FramedRead<tokio::io::ReadHalf<tokio::io::DuplexStream>, MessageCodec>,
        FramedWrite<tokio::io::WriteHalf<tokio::io::DuplexStream>, MessageCodec>,
    );

    fn pair() -> (Master, tokio::io::DuplexStream) {
        let (master, worker) = tokio::io::duplex(4096);
        let (r, w) = tokio::io::split(master);
        (
            (
                FramedRead::new(r, MessageCodec::new()),
                FramedWrite::new(w, MessageCodec::new()),
            ),
            worker,
        )
    }

    #[tokio::test]
    async fn processes_until_end_of_stream() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn PayloadHandler> = Arc::new(move |p: Payload| {
            let sink = sink.clone();
            async move {
                sink.lock().push(p.body);
                anyhow::Ok(())
            }
        });

        let ((mut rx, mut tx), worker_io) = pair();
        let (wr, ww) = tokio::io::split(worker_io);
        let mut runtime = WorkerRuntime::new(7, handler);
        let task = tokio::spawn(async move {
            let result = runtime.run(wr, ww).await;
            (result, runtime.state(), runtime.processed())
        });

        for n in 1..=2 {
            let request = rx.next().await.unwrap().unwrap();
            assert_eq!(request, Message::get_next_payload());
            tx.send(Message::set_next_payload(Payload::from_value(
                Some(Id::Int(n - 1)),
                json!(n),
            )))
            .await
            .unwrap();
        }
        assert_eq!(rx.next().await.unwrap().unwrap(), Message::get_next_payload());
        tx.send(Message::set_next_payload(Payload::end_of_stream(None)))
            .await
            .unwrap();

        let (result, state, processed) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(state, WorkerState::Stopped);
        assert_eq!(processed, 2);
        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn handler_error_crashes_the_worker() {
        let handler: Arc<dyn PayloadHandler> =
            Arc::new(|_p: Payload| async { Err::<(), _>(anyhow::anyhow!("downstream unavailable")) });

        let ((mut rx, mut tx), worker_io) = pair();
        let (wr, ww) = tokio::io::split(worker_io);
        let mut runtime = WorkerRuntime::new(8, handler);
        let task = tokio::spawn(async move {
            let result = runtime.run(wr, ww).await;
            (result, runtime.state())
        });

        rx.next().await.unwrap().unwrap();
        tx.send(Message::set_next_payload(Payload::from_value(
            Some(Id::Int(0)),
            json!("x"),
        )))
        .await
        .unwrap();

        let (result, state) = task.await.unwrap();
        assert!(matches!(result, Err(CoordinationError::UserHandler(_))));
        assert_eq!(state, WorkerState::Crashed);
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let handler: Arc<dyn PayloadHandler> = Arc::new(|_p: Payload| async { anyhow::Ok(()) });
        let ((rx, tx), worker_io) = pair();
        drop(rx);
        drop(tx);

        let (wr, ww) = tokio::io::split(worker_io);
        let mut runtime = WorkerRuntime::new(9, handler);
        let result = runtime.run(wr, ww).await;
        assert!(result.is_err());
        assert!(runtime.state().is_terminal());
    }
}
