use nanoid::nanoid;
use rand::Rng;
use std::time::Duration;

// ==========================================
// 1. 标识工具 (Identity Utilities)
// ==========================================

const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// 生成分布式锁的持有者令牌
///
/// 格式: `hostname:pid:随机串`。释放锁时只删除值等于自己令牌的 Key，
/// 所以令牌必须在所有 Master 之间唯一。
pub fn new_lock_token() -> String {
    format!(
        "{}:{}:{}",
        get_hostname(),
        std::process::id(),
        nanoid!(16, &ALPHABET)
    )
}

/// 获取当前机器的主机名
pub fn get_hostname() -> String {
    hostname::get()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| format!("node_{}", nanoid!(5, &ALPHABET)))
}

// ==========================================
// 2. 算法工具 (Algorithmic Utilities)
// ==========================================

/// 计算指数退避时间 (Exponential Backoff with Full Jitter)
///
/// - attempt: 当前重试次数 (1, 2, 3...)
/// - base_delay: 基础延迟
/// - max_delay: 最大延迟
pub fn calculate_backoff(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    let mut rng = rand::rng();

    // base * 2^(attempt-1)
    let exponent = 2u32.saturating_pow(attempt.saturating_sub(1));
    let backoff = base_delay
        .saturating_mul(exponent)
        .min(max_delay)
        .as_secs_f64();

    // 随机取 [0, backoff]
    let jittered = rng.random_range(0.0..=backoff);

    // 至少 1ms
    Duration::from_secs_f64(jittered).max(Duration::from_millis(1))
}

/// 固定延迟加上 `[0, jitter]` 的随机抖动
pub fn with_jitter(delay: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return delay;
    }
    let extra = rand::rng().random_range(0..=jitter.as_millis() as u64);
    delay + Duration::from_millis(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_respects_the_cap() {
        for attempt in 1..40 {
            let d = calculate_backoff(attempt, Duration::from_millis(50), Duration::from_secs(2));
            assert!(d <= Duration::from_secs(2));
            assert!(d >= Duration::from_millis(1));
        }
    }

    #[test]
    fn jitter_stays_within_window() {
        let base = Duration::from_millis(200);
        for _ in 0..100 {
            let d = with_jitter(base, Duration::from_millis(50));
            assert!(d >= base && d <= base + Duration::from_millis(50));
        }
        assert_eq!(with_jitter(base, Duration::ZERO), base);
    }

    #[test]
    fn lock_tokens_are_unique() {
        assert_ne!(new_lock_token(), new_lock_token());
    }
}
