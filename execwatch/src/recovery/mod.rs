//! Stream recovery: a generic combinator that re-subscribes, substitutes,
//! skips, restarts, or escalates when a value stream fails.

mod policy;
mod wrapper;

pub use policy::{RecoveryPolicy, RecoveryStrategy, Restart};
pub use wrapper::{wrap_stream, RecoveringStream};
