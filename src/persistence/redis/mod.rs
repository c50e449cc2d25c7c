mod core;
mod lock;
mod scripts;
mod store;

pub use self::core::RedisStore;
