mod process;
mod runtime;

pub use process::run_worker_process;
pub use runtime::{WorkerRuntime, WorkerState};
