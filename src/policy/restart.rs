use crate::common::config::PoolConfig;

/// 重启决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// 拉起替补 Worker
    Respawn,
    /// 已达上限，不再重启
    LimitReached,
    /// 未开启自动重启
    Disabled,
}

/// Worker 重启预算
///
/// - 计数在整个协调器生命周期内累计，不会随时间衰减。
/// - 只有非正常退出才会消耗预算。
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    enabled: bool,
    max: usize,
    restarted: usize,
}

impl RestartPolicy {
    pub fn new(enabled: bool, max: usize) -> Self {
        Self {
            enabled,
            max,
            restarted: 0,
        }
    }

    pub fn from_config(cfg: &PoolConfig) -> Self {
        Self::new(cfg.restart_worker_on_exit, cfg.max_restarts())
    }

    /// 登记一次非正常退出并给出决策
    ///
    /// 返回 `Respawn` 时计数已经加一。
    pub fn on_abnormal_exit(&mut self) -> RestartDecision {
        if !self.enabled {
            return RestartDecision::Disabled;
        }
        if self.restarted >= self.max {
            return RestartDecision::LimitReached;
        }
        self.restarted += 1;
        RestartDecision::Respawn
    }

    /// 已经重启过的次数
    pub fn restarted(&self) -> usize {
        self.restarted
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_consumed_then_exhausted() {
        let mut policy = RestartPolicy::new(true, 2);
        assert_eq!(policy.on_abnormal_exit(), RestartDecision::Respawn);
        assert_eq!(policy.on_abnormal_exit(), RestartDecision::Respawn);
        assert_eq!(policy.on_abnormal_exit(), RestartDecision::LimitReached);
        assert_eq!(policy.on_abnormal_exit(), RestartDecision::LimitReached);
        assert_eq!(policy.restarted(), 2);
    }

    #[test]
    fn zero_budget_never_restarts() {
        let mut policy = RestartPolicy::new(true, 0);
        assert_eq!(policy.on_abnormal_exit(), RestartDecision::LimitReached);
    }

    #[test]
    fn disabled_policy_ignores_the_budget() {
        let mut policy = RestartPolicy::new(false, 10);
        assert_eq!(policy.on_abnormal_exit(), RestartDecision::Disabled);
        assert_eq!(policy.restarted(), 0);
    }

    #[test]
    fn default_budget_scales_with_workers() {
        let cfg = PoolConfig {
            workers: 3,
            ..PoolConfig::default()
        };
        assert_eq!(RestartPolicy::from_config(&cfg).max(), 15);
    }
}
