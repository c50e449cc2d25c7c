use std::time::{SystemTime, UNIX_EPOCH};

/// 时间工具
pub struct TimeUtils;

impl TimeUtils {
    /// 当前 Unix 时间戳 (秒, 双精度)
    ///
    /// 分配记录的 `assignedAt` 用它生成。系统时钟早于 1970 时返回 0。
    pub fn now_f64() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}
