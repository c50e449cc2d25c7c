mod core;
mod lock;
mod store;

pub use self::core::MemoryStore;
