//! Runtime core of a set-top-box application.
//!
//! * [`input::rc`] normalizes remote-control key events: repeat tracking,
//!   long-press promotion and ASCII latching.
//! * [`lifecycle`] coordinates shutdown: `SIGTERM`, wake-up timer reset and
//!   the process exit code.
//! * [`net`] diagnoses connectivity: active adapter, carrier, reachability.

pub mod errors;
pub mod input;
pub mod lifecycle;
pub mod net;
