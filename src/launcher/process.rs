use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use super::{LaunchedWorker, WorkerExit, WorkerLauncher, WorkerProcess};
use crate::common::error::{CoordinationError, Result};

/// 子进程识别自己身份的环境变量
///
/// Master 拉起 Worker 时写入槽位编号，`ParallelWorker::start` 据此分流角色。
pub const WORKER_SLOT_ENV: &str = "STRIDE_WORKER_SLOT";

/// 进程启动器
///
/// 默认重新执行当前可执行文件 (带上原始参数)，也可以指定任意程序。
/// - stdin/stdout: 协议通道
/// - stderr: 继承 Master，Worker 日志直接打到终端
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// 当前可执行文件 + 当前命令行参数
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| CoordinationError::SpawnFailed(format!("resolve current exe: {}", e)))?;
        Ok(Self::new(program).args(std::env::args_os().skip(1)))
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, slot: usize) -> Result<LaunchedWorker> {
        let mut cmd = Command::new(&self.program);

        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(WORKER_SLOT_ENV, slot.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CoordinationError::SpawnFailed(e.to_string()))?;

        let pid = child
            .id()
            .ok_or_else(|| CoordinationError::SpawnFailed("failed to get process ID".into()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CoordinationError::SpawnFailed("worker stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoordinationError::SpawnFailed("worker stdout not captured".into()))?;

        debug!("[Launcher] Spawned worker process {} for slot {}", pid, slot);

        Ok(LaunchedWorker {
            pid,
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            process: Box::new(ChildProcess { child, exit: None }),
        })
    }
}

/// 子进程句柄
struct ChildProcess {
    child: Child,
    exit: Option<WorkerExit>,
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    async fn wait(&mut self) -> Result<WorkerExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let status = self.child.wait().await?;
        let exit = WorkerExit::from(status);
        self.exit = Some(exit);
        Ok(exit)
    }

    fn start_kill(&mut self) -> Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        self.child.start_kill()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn pipes_are_wired_to_the_child() {
        let launcher = ProcessLauncher::new("cat");
        let LaunchedWorker {
            pid,
            reader,
            mut writer,
            mut process,
        } = launcher.launch(0).await.unwrap();
        assert!(pid > 0);

        writer.write_all(b"{\"type\":\"getNextPayload\"}\n").await.unwrap();
        writer.flush().await.unwrap();

        let mut lines = BufReader::new(reader).lines();
        let echoed = lines.next_line().await.unwrap().unwrap();
        assert_eq!(echoed, "{\"type\":\"getNextPayload\"}");

        // 关闭 stdin，cat 正常退出
        drop(writer);
        let exit = process.wait().await.unwrap();
        assert!(exit.success());
        assert_eq!(process.wait().await.unwrap(), exit);
    }

    #[tokio::test]
    async fn slot_is_exported_to_the_child() {
        let launcher = ProcessLauncher::new("sh").args(["-c", "exit $STRIDE_WORKER_SLOT"]);
        let mut worker = launcher.launch(3).await.unwrap();
        assert_eq!(worker.process.wait().await.unwrap().code, Some(3));
    }

    #[tokio::test]
    async fn killed_child_reports_the_signal() {
        let launcher = ProcessLauncher::new("sleep").args(["30"]);
        let mut worker = launcher.launch(0).await.unwrap();
        worker.process.start_kill().unwrap();

        let exit = worker.process.wait().await.unwrap();
        assert!(!exit.success());
        assert_eq!(exit.signal, Some(9));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = ProcessLauncher::new("definitely-not-a-real-binary-7f3a")
            .launch(0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::SpawnFailed(_)));
    }
}
