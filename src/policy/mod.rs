mod backoff;
mod restart;

pub use backoff::{DispatchBackoff, RetryDecision};
pub use restart::{RestartDecision, RestartPolicy};
