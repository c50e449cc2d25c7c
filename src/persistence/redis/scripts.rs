use redis::Script;

/// Redis Lua 脚本库
///
/// 预加载所有脚本，避免每次调用时重新编译。
#[derive(Debug, Clone)]
pub(super) struct Scripts {
    /// 比较 token 后删除
    pub release: Script,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            release: Script::new(include_str!("../../scripts/redis_lock_release.lua")),
        }
    }
}
