mod builder;
mod role;

pub use builder::ParallelWorker;
pub use role::Role;
