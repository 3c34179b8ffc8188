//! Process lifecycle coordination: termination signals, wake-up timer reset
//! and exit code propagation.

mod builder;
mod coordinator;
mod signals;
mod wake_timer;

pub use builder::*;
pub use coordinator::*;
pub use wake_timer::*;
