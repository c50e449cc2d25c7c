use crate::launcher::WORKER_SLOT_ENV;

/// 当前进程的角色
///
/// Master 通过重新执行同一个可执行文件拉起 Worker，
/// 二者的区别只在于环境变量 `STRIDE_WORKER_SLOT` 是否存在。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Worker { slot: usize },
}

impl Role {
    pub fn current() -> Self {
        Self::from_env_value(std::env::var(WORKER_SLOT_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        match value.and_then(|v| v.trim().parse().ok()) {
            Some(slot) => Role::Worker { slot },
            None => Role::Master,
        }
    }
}
